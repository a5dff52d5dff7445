use crate::rules::shape::{all_statements, bare_text, branch_assignment, operand_text};
use crate::rules::{CheckContext, Fix, Match, Matcher, RuleEvaluationError, RuleId};
use crate::syntax::ast::{ExprKind, UnOp};

/// Flags `if c then T = true else T = false end`, which is just `T = c`.
///
/// The mirrored form (`false` in the then-branch) becomes `T = not c`.
#[derive(Debug, Default)]
pub struct RedundantBooleanMatcher;

impl Matcher for RedundantBooleanMatcher {
    fn rule(&self) -> RuleId {
        RuleId::RedundantBranchToBoolean
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<Match>, RuleEvaluationError> {
        let rule = self.rule();
        let mut matches = Vec::new();

        for stmt in all_statements(ctx.chunk) {
            let Some(branch) = branch_assignment(stmt) else {
                continue;
            };
            let (Some(when_true), Some(when_false)) = (
                branch.when_true.as_bool_literal(),
                branch.when_false.as_bool_literal(),
            ) else {
                continue;
            };
            if when_true == when_false {
                continue;
            }

            let target = ctx.text(rule, branch.target.span)?;
            let cond = branch.cond.strip_parens();
            let value = if when_true {
                bare_text(ctx, rule, cond)?.to_string()
            } else {
                match &cond.kind {
                    // not x  ->  x
                    ExprKind::Unary {
                        op: UnOp::Not,
                        operand,
                    } => bare_text(ctx, rule, operand)?.to_string(),
                    _ => format!("not {}", operand_text(ctx, rule, cond, |e| !e.is_primary())?),
                }
            };
            let replacement = format!("{} = {}", target, value);

            matches.push(Match {
                rule,
                span: stmt.span,
                message: format!(
                    "if/else only assigns `{}`/`{}` to `{}`; assign the condition directly",
                    when_true, when_false, target
                ),
                suggestion: Some(format!("replace with `{}`", replacement)),
                fix: Some(Fix {
                    span: stmt.span,
                    replacement,
                }),
            });
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::run;

    fn fixed(src: &str) -> Vec<String> {
        run(&RedundantBooleanMatcher, src)
            .into_iter()
            .filter_map(|m| m.fix.map(|f| f.replacement))
            .collect()
    }

    #[test]
    fn true_false_becomes_direct_assignment() {
        let src = "if(x.Boolean) then y.Boolean = true else y.Boolean = false end";
        let matches = run(&RedundantBooleanMatcher, src);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule, RuleId::RedundantBranchToBoolean);
        assert_eq!(matches[0].span.start, 0);
        assert_eq!(matches[0].span.end, src.len());
        assert_eq!(
            matches[0].fix.as_ref().map(|f| f.replacement.as_str()),
            Some("y.Boolean = x.Boolean")
        );
    }

    #[test]
    fn false_true_negates() {
        assert_eq!(
            fixed("if a.Value > 3 then b.Boolean = false else b.Boolean = true end"),
            vec!["b.Boolean = not (a.Value > 3)"]
        );
        assert_eq!(
            fixed("if ready then led.Boolean = false else led.Boolean = true end"),
            vec!["led.Boolean = not ready"]
        );
    }

    #[test]
    fn double_negation_is_removed() {
        assert_eq!(
            fixed("if not (a == b) then x = false else x = true end"),
            vec!["x = a == b"]
        );
    }

    #[test]
    fn same_literal_in_both_branches_is_ignored() {
        assert!(fixed("if c then x = true else x = true end").is_empty());
    }

    #[test]
    fn different_targets_are_ignored() {
        assert!(fixed("if c then x = true else y = false end").is_empty());
    }

    #[test]
    fn non_boolean_values_are_ignored() {
        assert!(fixed("if c then x = 1 else x = 0 end").is_empty());
    }

    #[test]
    fn nested_in_handler_is_found() {
        let src = "Controls.A.EventHandler = function(c)\n  if c.Boolean then Controls.B.Boolean = true else Controls.B.Boolean = false end\nend";
        assert_eq!(fixed(src), vec!["Controls.B.Boolean = c.Boolean"]);
    }

    #[test]
    fn clean_source_has_no_matches() {
        assert!(fixed("y.Boolean = x.Boolean\nif a then print(1) end").is_empty());
    }
}
