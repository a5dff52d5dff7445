//! Syntax tree for control scripts.
//!
//! Every node records the byte span it was parsed from so matchers can
//! report locations and slice the original text when building rewrites.

use crate::syntax::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Local {
        names: Vec<Name>,
        values: Vec<Expr>,
    },
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
    },
    /// A function or method call used as a statement.
    Call(Expr),
    Do(Block),
    While {
        cond: Expr,
        body: Block,
    },
    Repeat {
        body: Block,
        cond: Expr,
    },
    If(IfStmt),
    NumericFor {
        var: Name,
        start: Expr,
        limit: Expr,
        step: Option<Expr>,
        body: Block,
    },
    GenericFor {
        vars: Vec<Name>,
        iter: Vec<Expr>,
        body: Block,
    },
    Function {
        name: FuncName,
        func: FuncBody,
    },
    LocalFunction {
        name: Name,
        func: FuncBody,
    },
    Return(Vec<Expr>),
    Break,
    Goto(Name),
    Label(Name),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Block,
    pub else_ifs: Vec<(Expr, Block)>,
    pub else_block: Option<Block>,
}

/// `a.b.c` or `a.b:c` in a `function` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncName {
    pub path: Vec<Name>,
    pub method: Option<Name>,
}

impl FuncName {
    /// Dotted path of the function, or `None` for method definitions.
    pub fn dotted(&self) -> Option<String> {
        if self.method.is_some() {
            return None;
        }
        Some(
            self.path
                .iter()
                .map(|n| n.text.as_str())
                .collect::<Vec<_>>()
                .join("."),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    pub params: Vec<Name>,
    pub vararg: bool,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Nil,
    True,
    False,
    Number(String),
    Str(String),
    Vararg,
    Function(Box<FuncBody>),
    Table(Vec<TableField>),
    Name(String),
    /// `obj.name`
    Field {
        obj: Box<Expr>,
        name: Name,
    },
    /// `obj[key]`
    Index {
        obj: Box<Expr>,
        key: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `obj:method(args)`
    MethodCall {
        obj: Box<Expr>,
        method: Name,
        args: Vec<Expr>,
    },
    Paren(Box<Expr>),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableField {
    Keyed { key: Expr, value: Expr },
    Named { name: Name, value: Expr },
    Positional(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
    Len,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
    Eq,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add
                | BinOp::Sub
                | BinOp::Mul
                | BinOp::Div
                | BinOp::IDiv
                | BinOp::Mod
                | BinOp::Pow
                | BinOp::BitOr
                | BinOp::BitXor
                | BinOp::BitAnd
                | BinOp::Shl
                | BinOp::Shr
        )
    }
}

impl Expr {
    /// Peels any number of enclosing parentheses.
    pub fn strip_parens(&self) -> &Expr {
        let mut e = self;
        while let ExprKind::Paren(inner) = &e.kind {
            e = inner;
        }
        e
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool_literal(&self) -> Option<bool> {
        match self.strip_parens().kind {
            ExprKind::True => Some(true),
            ExprKind::False => Some(false),
            _ => None,
        }
    }

    /// Can appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Name(_) | ExprKind::Field { .. } | ExprKind::Index { .. }
        )
    }

    /// Literals, names, indexing, calls and parenthesised expressions:
    /// anything that binds tighter than every operator.
    pub fn is_primary(&self) -> bool {
        !matches!(self.kind, ExprKind::Unary { .. } | ExprKind::Binary { .. })
    }

    /// Object and property name when the expression is `obj.prop` or
    /// `obj["prop"]`.
    pub fn property(&self) -> Option<(&Expr, &str)> {
        match &self.kind {
            ExprKind::Field { obj, name } => Some((obj, &name.text)),
            ExprKind::Index { obj, key } => match &key.kind {
                ExprKind::Str(s) => Some((obj, s)),
                _ => None,
            },
            _ => None,
        }
    }
}
