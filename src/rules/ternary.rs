use crate::rules::shape::{all_statements, branch_assignment, is_binary, operand_text, same_shape};
use crate::rules::{CheckContext, Fix, Match, Matcher, RuleEvaluationError, RuleId};
use crate::syntax::ast::{BinOp, Expr, ExprKind, UnOp};

/// What is statically known about an expression's truthiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truthiness {
    /// Never `false` or `nil`.
    Always,
    /// Always `false` or `nil`.
    Never,
    Unknown,
}

pub fn truthiness(expr: &Expr) -> Truthiness {
    match &expr.kind {
        ExprKind::Nil | ExprKind::False => Truthiness::Never,
        ExprKind::True
        | ExprKind::Number(_)
        | ExprKind::Str(_)
        | ExprKind::Table(_)
        | ExprKind::Function(_) => Truthiness::Always,
        ExprKind::Paren(inner) => truthiness(inner),
        ExprKind::Unary { op, .. } => match op {
            UnOp::Neg | UnOp::Len | UnOp::BitNot => Truthiness::Always,
            UnOp::Not => Truthiness::Unknown,
        },
        ExprKind::Binary { op, lhs, rhs } => match op {
            BinOp::Concat => Truthiness::Always,
            op if op.is_arithmetic() => Truthiness::Always,
            BinOp::Or => match (truthiness(lhs), truthiness(rhs)) {
                (Truthiness::Always, _) | (_, Truthiness::Always) => Truthiness::Always,
                (Truthiness::Never, Truthiness::Never) => Truthiness::Never,
                _ => Truthiness::Unknown,
            },
            BinOp::And => match (truthiness(lhs), truthiness(rhs)) {
                (Truthiness::Always, Truthiness::Always) => Truthiness::Always,
                (Truthiness::Never, _) | (_, Truthiness::Never) => Truthiness::Never,
                _ => Truthiness::Unknown,
            },
            _ => Truthiness::Unknown,
        },
        ExprKind::Vararg
        | ExprKind::Name(_)
        | ExprKind::Field { .. }
        | ExprKind::Index { .. }
        | ExprKind::Call { .. }
        | ExprKind::MethodCall { .. } => Truthiness::Unknown,
    }
}

/// Flags if/else statements that pick one of two values for the same target
/// and could use `T = c and a or b` instead.
///
/// The short-circuit form is only equivalent when `a` can never be `false`
/// or `nil`; otherwise the match is reported without a fix.
#[derive(Debug, Default)]
pub struct TernaryMatcher;

impl Matcher for TernaryMatcher {
    fn rule(&self) -> RuleId {
        RuleId::TernaryOpportunity
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<Match>, RuleEvaluationError> {
        let rule = self.rule();
        let mut matches = Vec::new();

        for stmt in all_statements(ctx.chunk) {
            let Some(branch) = branch_assignment(stmt) else {
                continue;
            };
            if same_shape(branch.when_true, branch.when_false) {
                continue;
            }
            let target = ctx.text(rule, branch.target.span)?;

            let found = match truthiness(branch.when_true) {
                Truthiness::Always => {
                    let cond =
                        operand_text(ctx, rule, branch.cond, |e| is_binary(e, &[BinOp::Or]))?;
                    let when_true = operand_text(ctx, rule, branch.when_true, |e| {
                        is_binary(e, &[BinOp::And, BinOp::Or])
                    })?;
                    let when_false = ctx.text(rule, branch.when_false.span)?;
                    let replacement =
                        format!("{} = {} and {} or {}", target, cond, when_true, when_false);
                    Match {
                        rule,
                        span: stmt.span,
                        message: format!(
                            "if/else only chooses a value for `{}`; use the `and`/`or` form",
                            target
                        ),
                        suggestion: Some(format!("replace with `{}`", replacement)),
                        fix: Some(Fix {
                            span: stmt.span,
                            replacement,
                        }),
                    }
                }
                Truthiness::Never => Match {
                    rule,
                    span: stmt.span,
                    message: format!(
                        "if/else chooses a value for `{}`, but the true-branch value is always false or nil; \
                         `and`/`or` would always yield the else value, so this is not rewritten",
                        target
                    ),
                    suggestion: Some(
                        "keep the if/else, or swap the branches and negate the condition".into(),
                    ),
                    fix: None,
                },
                Truthiness::Unknown => Match {
                    rule,
                    span: stmt.span,
                    message: format!(
                        "if/else chooses a value for `{}`; unsafe to auto-rewrite because the true-branch value may be false or nil",
                        target
                    ),
                    suggestion: Some(
                        "use `cond and a or b` only if the true-branch value can never be false or nil"
                            .into(),
                    ),
                    fix: None,
                },
            };
            matches.push(found);
        }

        Ok(matches)
    }
}
