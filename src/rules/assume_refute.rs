use crate::rules::{CheckContext, Match, Matcher, RuleEvaluationError, RuleId};
use crate::syntax::ast::{Block, Expr, ExprKind, Stmt, StmtKind};
use crate::syntax::visit;
use std::collections::{BTreeSet, HashSet};

/// How a loop uses the value it assumed before starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// The assumption is overwritten with a fixed value once a
    /// counterexample turns up.
    AllTrue,
    /// The assumption is replaced by whatever the current iteration found.
    BestCandidate,
}

impl SearchKind {
    pub fn label(self) -> &'static str {
        match self {
            SearchKind::AllTrue => "all-true check",
            SearchKind::BestCandidate => "best-candidate search",
        }
    }
}

struct Update<'a> {
    name: &'a str,
    value: &'a Expr,
    conditional: bool,
    /// The branch that performs the update also leaves the loop.
    breaks: bool,
}

/// Recognises the assume-and-refute idiom: a value is assumed before a loop
/// and only conditionally overwritten inside it.
#[derive(Debug, Default)]
pub struct AssumeRefuteMatcher;

impl Matcher for AssumeRefuteMatcher {
    fn rule(&self) -> RuleId {
        RuleId::AssumeAndRefute
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<Match>, RuleEvaluationError> {
        let rule = self.rule();
        let mut matches = Vec::new();

        let mut blocks = Vec::new();
        visit::for_each_block(ctx.chunk, &mut |block| blocks.push(block));

        for block in blocks {
            for (index, stmt) in block.stmts.iter().enumerate() {
                let Some(body) = loop_body(stmt) else {
                    continue;
                };
                let locals = loop_locals(stmt, body);
                let mut updates = Vec::new();
                collect_updates(body, false, false, &mut updates);

                let unconditional: HashSet<&str> = updates
                    .iter()
                    .filter(|u| !u.conditional)
                    .map(|u| u.name)
                    .collect();
                let accumulators: BTreeSet<&str> = updates
                    .iter()
                    .map(|u| u.name)
                    .filter(|name| {
                        !unconditional.contains(name)
                            && !locals.contains(name)
                            && initialised_before(&block.stmts[..index], name)
                    })
                    .collect();
                if accumulators.is_empty() {
                    continue;
                }

                let relevant: Vec<&Update> = updates
                    .iter()
                    .filter(|u| accumulators.contains(u.name))
                    .collect();
                let kind = if relevant.iter().any(|u| mentions_any(u.value, &locals)) {
                    SearchKind::BestCandidate
                } else {
                    SearchKind::AllTrue
                };
                let names = accumulators
                    .iter()
                    .map(|n| format!("`{}`", n))
                    .collect::<Vec<_>>()
                    .join(", ");

                let suggestion = match kind {
                    SearchKind::AllTrue if !relevant.iter().all(|u| u.breaks) => Some(format!(
                        "`break` once {} is refuted; later iterations cannot change the result",
                        names
                    )),
                    _ => None,
                };
                matches.push(Match {
                    rule,
                    span: stmt.span,
                    message: format!(
                        "loop assumes {} and overwrites it conditionally ({})",
                        names,
                        kind.label()
                    ),
                    suggestion,
                    fix: None,
                });
            }
        }

        Ok(matches)
    }
}

fn loop_body(stmt: &Stmt) -> Option<&Block> {
    match &stmt.kind {
        StmtKind::While { body, .. }
        | StmtKind::Repeat { body, .. }
        | StmtKind::NumericFor { body, .. }
        | StmtKind::GenericFor { body, .. } => Some(body),
        _ => None,
    }
}

/// Loop variables plus every local declared anywhere in the body.
fn loop_locals<'a>(stmt: &'a Stmt, body: &'a Block) -> HashSet<&'a str> {
    let mut locals = HashSet::new();
    let mut declare = |s: &'a Stmt| match &s.kind {
        StmtKind::NumericFor { var, .. } => {
            locals.insert(var.text.as_str());
        }
        StmtKind::GenericFor { vars, .. } => locals.extend(vars.iter().map(|v| v.text.as_str())),
        StmtKind::Local { names, .. } => locals.extend(names.iter().map(|n| n.text.as_str())),
        StmtKind::LocalFunction { name, .. } => {
            locals.insert(name.text.as_str());
        }
        _ => {}
    };
    declare(stmt);
    visit::for_each_stmt(body, &mut declare);
    locals
}

/// Plain-name assignments in a loop body. Nested loops are left to their own
/// analysis; `do` blocks are transparent.
fn collect_updates<'a>(
    block: &'a Block,
    conditional: bool,
    breaks: bool,
    out: &mut Vec<Update<'a>>,
) {
    for stmt in &block.stmts {
        match &stmt.kind {
            StmtKind::Assign { targets, values } => {
                for (target, value) in targets.iter().zip(values) {
                    if let ExprKind::Name(name) = &target.kind {
                        out.push(Update {
                            name,
                            value,
                            conditional,
                            breaks,
                        });
                    }
                }
            }
            StmtKind::If(if_stmt) => {
                let branches = std::iter::once(&if_stmt.then_block)
                    .chain(if_stmt.else_ifs.iter().map(|(_, b)| b))
                    .chain(if_stmt.else_block.iter());
                for branch in branches {
                    let leaves = branch
                        .stmts
                        .iter()
                        .any(|s| matches!(s.kind, StmtKind::Break | StmtKind::Return(_)));
                    collect_updates(branch, true, breaks || leaves, out);
                }
            }
            StmtKind::Do(inner) => collect_updates(inner, conditional, breaks, out),
            _ => {}
        }
    }
}

fn initialised_before(stmts: &[Stmt], name: &str) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Local { names, .. } => names.iter().any(|n| n.text == name),
        StmtKind::Assign { targets, .. } => targets.iter().any(|t| t.as_name() == Some(name)),
        _ => false,
    })
}

fn mentions_any(expr: &Expr, names: &HashSet<&str>) -> bool {
    let mut found = false;
    visit::walk_expr(expr, &mut |e| {
        if let ExprKind::Name(n) = &e.kind {
            found |= names.contains(n.as_str());
        }
    });
    found
}
