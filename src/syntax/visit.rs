//! Tree walkers. Statement and expression walks stay inside one function
//! scope; `for_each_function` and `for_each_block` are the only walks that
//! descend into function bodies.

use crate::syntax::ast::*;

/// Blocks nested directly under a control statement, excluding function bodies.
pub fn child_blocks(stmt: &Stmt) -> Vec<&Block> {
    match &stmt.kind {
        StmtKind::Do(b) => vec![b],
        StmtKind::While { body, .. }
        | StmtKind::Repeat { body, .. }
        | StmtKind::NumericFor { body, .. }
        | StmtKind::GenericFor { body, .. } => vec![body],
        StmtKind::If(i) => {
            let mut blocks = vec![&i.then_block];
            blocks.extend(i.else_ifs.iter().map(|(_, b)| b));
            blocks.extend(i.else_block.iter());
            blocks
        }
        _ => Vec::new(),
    }
}

/// Expressions owned directly by a statement (not by its nested blocks).
pub fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match &stmt.kind {
        StmtKind::Local { values, .. } => values.iter().collect(),
        StmtKind::Assign { targets, values } => targets.iter().chain(values.iter()).collect(),
        StmtKind::Call(e) => vec![e],
        StmtKind::While { cond, .. } | StmtKind::Repeat { cond, .. } => vec![cond],
        StmtKind::If(i) => {
            let mut exprs = vec![&i.cond];
            exprs.extend(i.else_ifs.iter().map(|(c, _)| c));
            exprs
        }
        StmtKind::NumericFor {
            start, limit, step, ..
        } => {
            let mut exprs = vec![start, limit];
            exprs.extend(step.iter());
            exprs
        }
        StmtKind::GenericFor { iter, .. } => iter.iter().collect(),
        StmtKind::Return(values) => values.iter().collect(),
        StmtKind::Do(_)
        | StmtKind::Function { .. }
        | StmtKind::LocalFunction { .. }
        | StmtKind::Break
        | StmtKind::Goto(_)
        | StmtKind::Label(_) => Vec::new(),
    }
}

/// Visits every statement of `block` in source order, including statements in
/// nested control blocks, without entering function bodies.
pub fn for_each_stmt<'a, F: FnMut(&'a Stmt)>(block: &'a Block, f: &mut F) {
    for stmt in &block.stmts {
        f(stmt);
        for child in child_blocks(stmt) {
            for_each_stmt(child, f);
        }
    }
}

/// Pre-order walk over an expression tree that does not enter function literals.
pub fn walk_expr<'a, F: FnMut(&'a Expr)>(expr: &'a Expr, f: &mut F) {
    f(expr);
    match &expr.kind {
        ExprKind::Field { obj, .. } => walk_expr(obj, f),
        ExprKind::Index { obj, key } => {
            walk_expr(obj, f);
            walk_expr(key, f);
        }
        ExprKind::Call { func, args } => {
            walk_expr(func, f);
            args.iter().for_each(|a| walk_expr(a, f));
        }
        ExprKind::MethodCall { obj, args, .. } => {
            walk_expr(obj, f);
            args.iter().for_each(|a| walk_expr(a, f));
        }
        ExprKind::Paren(inner) => walk_expr(inner, f),
        ExprKind::Unary { operand, .. } => walk_expr(operand, f),
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, f);
            walk_expr(rhs, f);
        }
        ExprKind::Table(fields) => {
            for field in fields {
                match field {
                    TableField::Keyed { key, value } => {
                        walk_expr(key, f);
                        walk_expr(value, f);
                    }
                    TableField::Named { value, .. } | TableField::Positional(value) => {
                        walk_expr(value, f)
                    }
                }
            }
        }
        ExprKind::Nil
        | ExprKind::True
        | ExprKind::False
        | ExprKind::Number(_)
        | ExprKind::Str(_)
        | ExprKind::Vararg
        | ExprKind::Function(_)
        | ExprKind::Name(_) => {}
    }
}

/// Every expression in the block's scope, statement by statement.
pub fn for_each_expr<'a, F: FnMut(&'a Expr)>(block: &'a Block, f: &mut F) {
    for_each_stmt(block, &mut |stmt| {
        for e in stmt_exprs(stmt) {
            walk_expr(e, f);
        }
    });
}

/// Every function body in the tree, nested ones included.
pub fn for_each_function<'a, F: FnMut(&'a FuncBody)>(block: &'a Block, f: &mut F) {
    let mut bodies: Vec<&'a FuncBody> = Vec::new();
    collect_functions(block, &mut bodies);
    for body in bodies {
        f(body);
    }
}

fn collect_functions<'a>(block: &'a Block, out: &mut Vec<&'a FuncBody>) {
    let mut found: Vec<&'a FuncBody> = Vec::new();
    for_each_stmt(block, &mut |stmt| {
        match &stmt.kind {
            StmtKind::Function { func, .. } | StmtKind::LocalFunction { func, .. } => {
                found.push(func)
            }
            _ => {}
        }
        for e in stmt_exprs(stmt) {
            walk_expr(e, &mut |expr| {
                if let ExprKind::Function(body) = &expr.kind {
                    found.push(body);
                }
            });
        }
    });
    for body in found {
        out.push(body);
        collect_functions(&body.body, out);
    }
}

/// Every block in the tree: `block` itself, nested control blocks and
/// function bodies at any depth.
pub fn for_each_block<'a, F: FnMut(&'a Block)>(block: &'a Block, f: &mut F) {
    let mut scopes = vec![block];
    for_each_function(block, &mut |func| scopes.push(&func.body));
    for scope in scopes {
        visit_blocks(scope, f);
    }
}

fn visit_blocks<'a, F: FnMut(&'a Block)>(block: &'a Block, f: &mut F) {
    f(block);
    for stmt in &block.stmts {
        for child in child_blocks(stmt) {
            visit_blocks(child, f);
        }
    }
}
