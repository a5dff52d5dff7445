//! Tree-shape helpers shared by the matchers.

use crate::model::expr_path;
use crate::rules::{CheckContext, RuleEvaluationError, RuleId};
use crate::syntax::ast::*;
use crate::syntax::visit;
use std::collections::HashMap;

/// Every statement in the file, across all scopes.
pub fn all_statements(chunk: &Block) -> Vec<&Stmt> {
    let mut stmts = Vec::new();
    visit::for_each_block(chunk, &mut |block| stmts.extend(block.stmts.iter()));
    stmts
}

/// The chunk plus every function body: the scopes in which initialization
/// code runs.
pub fn scopes(chunk: &Block) -> Vec<&Block> {
    let mut scopes = vec![chunk];
    visit::for_each_function(chunk, &mut |func| scopes.push(&func.body));
    scopes
}

/// `(target, value)` when the block is exactly one single-target assignment.
pub fn single_assignment(block: &Block) -> Option<(&Expr, &Expr)> {
    match block.stmts.as_slice() {
        [Stmt {
            kind: StmtKind::Assign { targets, values },
            ..
        }] if targets.len() == 1 && values.len() == 1 => Some((&targets[0], &values[0])),
        _ => None,
    }
}

/// An `if c then T = a else T = b end` statement.
pub struct BranchAssignment<'a> {
    pub cond: &'a Expr,
    pub target: &'a Expr,
    pub when_true: &'a Expr,
    pub when_false: &'a Expr,
}

pub fn branch_assignment(stmt: &Stmt) -> Option<BranchAssignment<'_>> {
    let StmtKind::If(if_stmt) = &stmt.kind else {
        return None;
    };
    if !if_stmt.else_ifs.is_empty() {
        return None;
    }
    let (target, when_true) = single_assignment(&if_stmt.then_block)?;
    let (other_target, when_false) = single_assignment(if_stmt.else_block.as_ref()?)?;
    if !same_shape(target, other_target) {
        return None;
    }
    Some(BranchAssignment {
        cond: &if_stmt.cond,
        target,
        when_true,
        when_false,
    })
}

/// Structural equality ignoring spans. Function literals never compare equal.
pub fn same_shape(a: &Expr, b: &Expr) -> bool {
    use ExprKind::*;
    match (&a.kind, &b.kind) {
        (Nil, Nil) | (True, True) | (False, False) | (Vararg, Vararg) => true,
        (Number(x), Number(y)) | (Str(x), Str(y)) | (Name(x), Name(y)) => x == y,
        (Field { obj: o1, name: n1 }, Field { obj: o2, name: n2 }) => {
            n1.text == n2.text && same_shape(o1, o2)
        }
        (Index { obj: o1, key: k1 }, Index { obj: o2, key: k2 }) => {
            same_shape(o1, o2) && same_shape(k1, k2)
        }
        (Field { .. }, Index { .. }) | (Index { .. }, Field { .. }) => {
            matches!((expr_path(a), expr_path(b)), (Some(x), Some(y)) if x == y)
        }
        (Call { func: f1, args: a1 }, Call { func: f2, args: a2 }) => {
            same_shape(f1, f2) && all_same(a1, a2)
        }
        (
            MethodCall {
                obj: o1,
                method: m1,
                args: a1,
            },
            MethodCall {
                obj: o2,
                method: m2,
                args: a2,
            },
        ) => m1.text == m2.text && same_shape(o1, o2) && all_same(a1, a2),
        (Paren(x), Paren(y)) => same_shape(x, y),
        (
            Unary {
                op: op1,
                operand: x,
            },
            Unary {
                op: op2,
                operand: y,
            },
        ) => op1 == op2 && same_shape(x, y),
        (
            Binary {
                op: op1,
                lhs: l1,
                rhs: r1,
            },
            Binary {
                op: op2,
                lhs: l2,
                rhs: r2,
            },
        ) => op1 == op2 && same_shape(l1, l2) && same_shape(r1, r2),
        (Table(f1), Table(f2)) => {
            f1.len() == f2.len()
                && f1.iter().zip(f2).all(|pair| match pair {
                    (TableField::Positional(x), TableField::Positional(y)) => same_shape(x, y),
                    (
                        TableField::Named { name: n1, value: v1 },
                        TableField::Named { name: n2, value: v2 },
                    ) => n1.text == n2.text && same_shape(v1, v2),
                    (
                        TableField::Keyed { key: k1, value: v1 },
                        TableField::Keyed { key: k2, value: v2 },
                    ) => same_shape(k1, k2) && same_shape(v1, v2),
                    _ => false,
                })
        }
        _ => false,
    }
}

fn all_same(a: &[Expr], b: &[Expr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_shape(x, y))
}

/// Source text of `expr` without redundant outer parentheses.
pub fn bare_text<'a>(
    ctx: &CheckContext<'a>,
    rule: RuleId,
    expr: &Expr,
) -> Result<&'a str, RuleEvaluationError> {
    ctx.text(rule, expr.strip_parens().span)
}

/// Source text of `expr`, parenthesised when `wrap` says the surrounding
/// operator would otherwise capture part of it.
pub fn operand_text(
    ctx: &CheckContext,
    rule: RuleId,
    expr: &Expr,
    wrap: impl Fn(&Expr) -> bool,
) -> Result<String, RuleEvaluationError> {
    let inner = expr.strip_parens();
    let text = ctx.text(rule, inner.span)?;
    Ok(if wrap(inner) {
        format!("({})", text)
    } else {
        text.to_string()
    })
}

pub fn is_binary(expr: &Expr, ops: &[BinOp]) -> bool {
    matches!(&expr.kind, ExprKind::Binary { op, .. } if ops.contains(op))
}

/// Dotted function paths defined anywhere in the file.
pub fn function_definitions(chunk: &Block) -> HashMap<String, &FuncBody> {
    let mut defs = HashMap::new();
    for stmt in all_statements(chunk) {
        match &stmt.kind {
            StmtKind::Function { name, func } => {
                if let Some(path) = name.dotted() {
                    defs.insert(path, func);
                }
            }
            StmtKind::LocalFunction { name, func } => {
                defs.insert(name.text.clone(), func);
            }
            StmtKind::Local { names, values } => {
                for (name, value) in names.iter().zip(values) {
                    if let ExprKind::Function(func) = &value.kind {
                        defs.insert(name.text.clone(), &**func);
                    }
                }
            }
            StmtKind::Assign { targets, values } => {
                for (target, value) in targets.iter().zip(values) {
                    if let (Some(path), ExprKind::Function(func)) = (expr_path(target), &value.kind)
                    {
                        defs.insert(path, &**func);
                    }
                }
            }
            _ => {}
        }
    }
    defs
}

/// Callee paths of every call in `block` (not inside nested functions),
/// with the byte offset where each call starts.
pub fn call_sites(block: &Block) -> Vec<(usize, String)> {
    let mut calls = Vec::new();
    visit::for_each_expr(block, &mut |expr| {
        if let ExprKind::Call { func, .. } = &expr.kind {
            if let Some(path) = expr_path(func) {
                calls.push((expr.span.start, path));
            }
        }
    });
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse_chunk;

    fn values(src: &str) -> Vec<Expr> {
        let block = parse_chunk(src).unwrap();
        block
            .stmts
            .into_iter()
            .flat_map(|s| match s.kind {
                StmtKind::Assign { values, .. } => values,
                _ => Vec::new(),
            })
            .collect()
    }

    #[test]
    fn shapes_ignore_spacing_and_index_style() {
        let v = values("a = x.y [ 1 ]\nb = x.y[1]\nc = t['k']\nd = t.k\ne = f(1)\nf = f(2)");
        assert!(same_shape(&v[0], &v[1]));
        assert!(same_shape(&v[2], &v[3]));
        assert!(!same_shape(&v[4], &v[5]));
    }

    #[test]
    fn function_literals_never_match() {
        let v = values("a = function() end\nb = function() end");
        assert!(!same_shape(&v[0], &v[1]));
    }

    #[test]
    fn branch_assignment_requires_same_target() {
        let block = parse_chunk("if c then a = 1 else b = 2 end").unwrap();
        assert!(branch_assignment(&block.stmts[0]).is_none());
        let block = parse_chunk("if c then a = 1 elseif d then a = 3 else a = 2 end").unwrap();
        assert!(branch_assignment(&block.stmts[0]).is_none());
        let block = parse_chunk("if c then a = 1 else a = 2 end").unwrap();
        assert!(branch_assignment(&block.stmts[0]).is_some());
    }

    #[test]
    fn definitions_cover_all_forms() {
        let block = parse_chunk(
            "function a() end\nlocal function b(x) end\nlocal c = function(y, z) end\nM.d = function() end\nfunction M.e() end\nfunction M:f() end",
        )
        .unwrap();
        let defs = function_definitions(&block);
        let mut names: Vec<&str> = defs.keys().map(|k| k.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["M.d", "M.e", "a", "b", "c"]);
        assert_eq!(defs["c"].params.len(), 2);
    }

    #[test]
    fn call_sites_stay_in_scope() {
        let block =
            parse_chunk("f(1)\nif c then g.h() end\nlocal k = function() inner() end").unwrap();
        let paths: Vec<String> = call_sites(&block).into_iter().map(|(_, p)| p).collect();
        assert_eq!(paths, vec!["f", "g.h"]);
    }
}
