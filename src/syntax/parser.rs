use crate::syntax::ast::*;
use crate::syntax::lexer::{tokenize, Token, TokenKind};
use crate::syntax::span::Span;
use crate::syntax::RawError;

const UNARY_PRIORITY: u8 = 12;

/// Nesting allowed for statements, sub-expressions and suffix chains.
/// Every consumer of the tree recurses, so the cap keeps them on the stack.
const MAX_SYNTAX_DEPTH: usize = 200;

/// Parses a whole chunk into its top-level block.
pub fn parse_chunk(src: &str) -> Result<Block, RawError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        prev_end: 0,
        depth: 0,
    };
    let block = parser.block()?;
    if !parser.check(&TokenKind::Eof) {
        return Err(parser.unexpected("'<eof>' expected"));
    }
    Ok(block)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    prev_end: usize,
    depth: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        // tokenize always ends the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn start(&self) -> usize {
        self.current().span.start
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        self.prev_end = token.span.end;
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn enter(&mut self) -> Result<(), RawError> {
        self.depth += 1;
        if self.depth > MAX_SYNTAX_DEPTH {
            return Err(RawError {
                message: "too many syntax levels".into(),
                offset: self.start(),
            });
        }
        Ok(())
    }

    fn unexpected(&self, expectation: &str) -> RawError {
        let token = self.current();
        RawError {
            message: format!("{} near {}", expectation, token.kind),
            offset: token.span.start,
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token, RawError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("'{}' expected {}", symbol_text(&kind), context)))
        }
    }

    fn expect_closing(
        &mut self,
        kind: TokenKind,
        opener: &str,
        open_at: usize,
    ) -> Result<Token, RawError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let what = format!(
                "'{}' expected (to close '{}' at byte {})",
                symbol_text(&kind),
                opener,
                open_at
            );
            Err(self.unexpected(&what))
        }
    }

    fn name(&mut self) -> Result<Name, RawError> {
        match &self.current().kind {
            TokenKind::Name(text) => {
                let name = Name {
                    text: text.clone(),
                    span: self.current().span,
                };
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("name expected")),
        }
    }

    fn block_follows(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Eof | TokenKind::End | TokenKind::Else | TokenKind::ElseIf | TokenKind::Until
        )
    }

    fn block(&mut self) -> Result<Block, RawError> {
        let start = self.start();
        let mut stmts = Vec::new();
        while !self.block_follows() {
            if self.check(&TokenKind::Return) {
                stmts.push(self.return_stmt()?);
                break;
            }
            if let Some(stmt) = self.statement()? {
                stmts.push(stmt);
            }
        }
        let end = stmts.last().map_or(start, |s: &Stmt| s.span.end);
        Ok(Block {
            stmts,
            span: Span::new(start, end),
        })
    }

    fn return_stmt(&mut self) -> Result<Stmt, RawError> {
        let start = self.start();
        self.advance();
        let values = if self.block_follows() || self.check(&TokenKind::Semicolon) {
            Vec::new()
        } else {
            self.expr_list()?
        };
        self.eat(&TokenKind::Semicolon);
        Ok(Stmt {
            kind: StmtKind::Return(values),
            span: self.span_from(start),
        })
    }

    fn statement(&mut self) -> Result<Option<Stmt>, RawError> {
        let saved = self.depth;
        self.enter()?;
        let stmt = self.statement_inner();
        self.depth = saved;
        stmt
    }

    fn statement_inner(&mut self) -> Result<Option<Stmt>, RawError> {
        let start = self.start();
        let kind = match self.current().kind {
            TokenKind::Semicolon => {
                self.advance();
                return Ok(None);
            }
            TokenKind::If => StmtKind::If(self.if_stmt()?),
            TokenKind::While => {
                self.advance();
                let cond = self.expr()?;
                self.expect(TokenKind::Do, "after 'while' condition")?;
                let body = self.block()?;
                self.expect_closing(TokenKind::End, "while", start)?;
                StmtKind::While { cond, body }
            }
            TokenKind::Do => {
                self.advance();
                let body = self.block()?;
                self.expect_closing(TokenKind::End, "do", start)?;
                StmtKind::Do(body)
            }
            TokenKind::For => self.for_stmt(start)?,
            TokenKind::Repeat => {
                self.advance();
                let body = self.block()?;
                self.expect_closing(TokenKind::Until, "repeat", start)?;
                let cond = self.expr()?;
                StmtKind::Repeat { body, cond }
            }
            TokenKind::Function => {
                self.advance();
                let name = self.func_name()?;
                let func = self.func_body(start)?;
                StmtKind::Function { name, func }
            }
            TokenKind::Local => {
                self.advance();
                if self.eat(&TokenKind::Function) {
                    let name = self.name()?;
                    let func = self.func_body(start)?;
                    StmtKind::LocalFunction { name, func }
                } else {
                    self.local_stmt()?
                }
            }
            TokenKind::DoubleColon => {
                self.advance();
                let label = self.name()?;
                self.expect(TokenKind::DoubleColon, "after label name")?;
                StmtKind::Label(label)
            }
            TokenKind::Break => {
                self.advance();
                StmtKind::Break
            }
            TokenKind::Goto => {
                self.advance();
                StmtKind::Goto(self.name()?)
            }
            _ => self.expr_stmt()?,
        };
        Ok(Some(Stmt {
            kind,
            span: self.span_from(start),
        }))
    }

    fn if_stmt(&mut self) -> Result<IfStmt, RawError> {
        let start = self.start();
        self.advance();
        let cond = self.expr()?;
        self.expect(TokenKind::Then, "after 'if' condition")?;
        let then_block = self.block()?;
        let mut else_ifs = Vec::new();
        while self.eat(&TokenKind::ElseIf) {
            let c = self.expr()?;
            self.expect(TokenKind::Then, "after 'elseif' condition")?;
            let b = self.block()?;
            else_ifs.push((c, b));
        }
        let else_block = if self.eat(&TokenKind::Else) {
            Some(self.block()?)
        } else {
            None
        };
        self.expect_closing(TokenKind::End, "if", start)?;
        Ok(IfStmt {
            cond,
            then_block,
            else_ifs,
            else_block,
        })
    }

    fn for_stmt(&mut self, start: usize) -> Result<StmtKind, RawError> {
        self.advance();
        let first = self.name()?;
        if self.eat(&TokenKind::Assign) {
            let from = self.expr()?;
            self.expect(TokenKind::Comma, "in numeric 'for'")?;
            let limit = self.expr()?;
            let step = if self.eat(&TokenKind::Comma) {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect(TokenKind::Do, "in numeric 'for'")?;
            let body = self.block()?;
            self.expect_closing(TokenKind::End, "for", start)?;
            return Ok(StmtKind::NumericFor {
                var: first,
                start: from,
                limit,
                step,
                body,
            });
        }
        let mut vars = vec![first];
        while self.eat(&TokenKind::Comma) {
            vars.push(self.name()?);
        }
        self.expect(TokenKind::In, "in generic 'for'")?;
        let iter = self.expr_list()?;
        self.expect(TokenKind::Do, "in generic 'for'")?;
        let body = self.block()?;
        self.expect_closing(TokenKind::End, "for", start)?;
        Ok(StmtKind::GenericFor { vars, iter, body })
    }

    fn local_stmt(&mut self) -> Result<StmtKind, RawError> {
        let mut names = Vec::new();
        loop {
            names.push(self.name()?);
            // attribute such as <const> or <close>
            if self.eat(&TokenKind::Less) {
                self.name()?;
                self.expect(TokenKind::Greater, "after local attribute")?;
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let values = if self.eat(&TokenKind::Assign) {
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(StmtKind::Local { names, values })
    }

    fn expr_stmt(&mut self) -> Result<StmtKind, RawError> {
        let first = self.suffixed_expr()?;
        if self.check(&TokenKind::Assign) || self.check(&TokenKind::Comma) {
            let mut targets = vec![first];
            while self.eat(&TokenKind::Comma) {
                targets.push(self.suffixed_expr()?);
            }
            if let Some(bad) = targets.iter().find(|t| !t.is_assignable()) {
                return Err(RawError {
                    message: "syntax error: cannot assign to this expression".into(),
                    offset: bad.span.start,
                });
            }
            self.expect(TokenKind::Assign, "in assignment")?;
            let values = self.expr_list()?;
            return Ok(StmtKind::Assign { targets, values });
        }
        match first.kind {
            ExprKind::Call { .. } | ExprKind::MethodCall { .. } => Ok(StmtKind::Call(first)),
            _ => Err(RawError {
                message: "syntax error: expression is not a statement".into(),
                offset: first.span.start,
            }),
        }
    }

    fn func_name(&mut self) -> Result<FuncName, RawError> {
        let mut path = vec![self.name()?];
        while self.eat(&TokenKind::Dot) {
            path.push(self.name()?);
        }
        let method = if self.eat(&TokenKind::Colon) {
            Some(self.name()?)
        } else {
            None
        };
        Ok(FuncName { path, method })
    }

    fn func_body(&mut self, start: usize) -> Result<FuncBody, RawError> {
        self.expect(TokenKind::LParen, "to open parameter list")?;
        let mut params = Vec::new();
        let mut vararg = false;
        if !self.check(&TokenKind::RParen) {
            loop {
                if self.eat(&TokenKind::Ellipsis) {
                    vararg = true;
                    break;
                }
                params.push(self.name()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close parameter list")?;
        let body = self.block()?;
        self.expect_closing(TokenKind::End, "function", start)?;
        Ok(FuncBody {
            params,
            vararg,
            body,
            span: self.span_from(start),
        })
    }

    fn expr_list(&mut self) -> Result<Vec<Expr>, RawError> {
        let mut exprs = vec![self.expr()?];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> Result<Expr, RawError> {
        self.sub_expr(0)
    }

    fn sub_expr(&mut self, limit: u8) -> Result<Expr, RawError> {
        let saved = self.depth;
        self.enter()?;
        let expr = self.sub_expr_inner(limit);
        self.depth = saved;
        expr
    }

    fn sub_expr_inner(&mut self, limit: u8) -> Result<Expr, RawError> {
        let start = self.start();
        let mut lhs = if let Some(op) = unary_op(&self.current().kind) {
            self.advance();
            let operand = self.sub_expr(UNARY_PRIORITY)?;
            Expr {
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span: self.span_from(start),
            }
        } else {
            self.simple_expr()?
        };

        while let Some((op, left, right)) = binary_op(&self.current().kind) {
            if left <= limit {
                break;
            }
            // each fold nests the tree one level deeper
            self.enter()?;
            self.advance();
            let rhs = self.sub_expr(right)?;
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span: self.span_from(start),
            };
        }
        Ok(lhs)
    }

    fn simple_expr(&mut self) -> Result<Expr, RawError> {
        let start = self.start();
        let kind = match &self.current().kind {
            TokenKind::Nil => ExprKind::Nil,
            TokenKind::True => ExprKind::True,
            TokenKind::False => ExprKind::False,
            TokenKind::Ellipsis => ExprKind::Vararg,
            TokenKind::Number(n) => ExprKind::Number(n.clone()),
            TokenKind::Str(s) => ExprKind::Str(s.clone()),
            TokenKind::LBrace => return self.table(),
            TokenKind::Function => {
                self.advance();
                let body = self.func_body(start)?;
                return Ok(Expr {
                    kind: ExprKind::Function(Box::new(body)),
                    span: self.span_from(start),
                });
            }
            _ => return self.suffixed_expr(),
        };
        self.advance();
        Ok(Expr {
            kind,
            span: self.span_from(start),
        })
    }

    fn primary_expr(&mut self) -> Result<Expr, RawError> {
        let start = self.start();
        match &self.current().kind {
            TokenKind::Name(n) => {
                let kind = ExprKind::Name(n.clone());
                self.advance();
                Ok(Expr {
                    kind,
                    span: self.span_from(start),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect_closing(TokenKind::RParen, "(", start)?;
                Ok(Expr {
                    kind: ExprKind::Paren(Box::new(inner)),
                    span: self.span_from(start),
                })
            }
            _ => Err(self.unexpected("unexpected symbol")),
        }
    }

    fn suffixed_expr(&mut self) -> Result<Expr, RawError> {
        let saved = self.depth;
        let expr = self.suffixed_expr_inner();
        self.depth = saved;
        expr
    }

    fn suffixed_expr_inner(&mut self) -> Result<Expr, RawError> {
        let start = self.start();
        let mut expr = self.primary_expr()?;
        loop {
            if matches!(
                self.current().kind,
                TokenKind::Dot
                    | TokenKind::LBracket
                    | TokenKind::Colon
                    | TokenKind::LParen
                    | TokenKind::LBrace
                    | TokenKind::Str(_)
            ) {
                self.enter()?;
            }
            let kind = match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.name()?;
                    ExprKind::Field {
                        obj: Box::new(expr),
                        name,
                    }
                }
                TokenKind::LBracket => {
                    let open = self.start();
                    self.advance();
                    let key = self.expr()?;
                    self.expect_closing(TokenKind::RBracket, "[", open)?;
                    ExprKind::Index {
                        obj: Box::new(expr),
                        key: Box::new(key),
                    }
                }
                TokenKind::Colon => {
                    self.advance();
                    let method = self.name()?;
                    let args = self.call_args()?;
                    ExprKind::MethodCall {
                        obj: Box::new(expr),
                        method,
                        args,
                    }
                }
                TokenKind::LParen | TokenKind::LBrace | TokenKind::Str(_) => {
                    let args = self.call_args()?;
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    }
                }
                _ => return Ok(expr),
            };
            expr = Expr {
                kind,
                span: self.span_from(start),
            };
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, RawError> {
        let start = self.start();
        match &self.current().kind {
            TokenKind::Str(s) => {
                let kind = ExprKind::Str(s.clone());
                self.advance();
                Ok(vec![Expr {
                    kind,
                    span: self.span_from(start),
                }])
            }
            TokenKind::LBrace => Ok(vec![self.table()?]),
            TokenKind::LParen => {
                self.advance();
                let args = if self.check(&TokenKind::RParen) {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                self.expect_closing(TokenKind::RParen, "(", start)?;
                Ok(args)
            }
            _ => Err(self.unexpected("function arguments expected")),
        }
    }

    fn table(&mut self) -> Result<Expr, RawError> {
        let start = self.start();
        self.expect(TokenKind::LBrace, "to open table")?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let named = matches!(self.current().kind, TokenKind::Name(_))
                && self.peek_kind(1) == &TokenKind::Assign;
            let field = if self.eat(&TokenKind::LBracket) {
                let key = self.expr()?;
                self.expect(TokenKind::RBracket, "after table key")?;
                self.expect(TokenKind::Assign, "after table key")?;
                let value = self.expr()?;
                TableField::Keyed { key, value }
            } else if named {
                let name = self.name()?;
                self.advance();
                let value = self.expr()?;
                TableField::Named { name, value }
            } else {
                TableField::Positional(self.expr()?)
            };
            fields.push(field);
            if !self.eat(&TokenKind::Comma) && !self.eat(&TokenKind::Semicolon) {
                break;
            }
        }
        self.expect_closing(TokenKind::RBrace, "{", start)?;
        Ok(Expr {
            kind: ExprKind::Table(fields),
            span: self.span_from(start),
        })
    }
}

fn symbol_text(kind: &TokenKind) -> String {
    let shown = kind.to_string();
    shown.trim_matches('\'').to_string()
}

fn unary_op(kind: &TokenKind) -> Option<UnOp> {
    match kind {
        TokenKind::Not => Some(UnOp::Not),
        TokenKind::Minus => Some(UnOp::Neg),
        TokenKind::Hash => Some(UnOp::Len),
        TokenKind::Tilde => Some(UnOp::BitNot),
        _ => None,
    }
}

/// Operator with its left and right binding priorities.
fn binary_op(kind: &TokenKind) -> Option<(BinOp, u8, u8)> {
    let entry = match kind {
        TokenKind::Or => (BinOp::Or, 1, 1),
        TokenKind::And => (BinOp::And, 2, 2),
        TokenKind::Less => (BinOp::Lt, 3, 3),
        TokenKind::Greater => (BinOp::Gt, 3, 3),
        TokenKind::LessEq => (BinOp::Le, 3, 3),
        TokenKind::GreaterEq => (BinOp::Ge, 3, 3),
        TokenKind::NotEq => (BinOp::Ne, 3, 3),
        TokenKind::Eq => (BinOp::Eq, 3, 3),
        TokenKind::Pipe => (BinOp::BitOr, 4, 4),
        TokenKind::Tilde => (BinOp::BitXor, 5, 5),
        TokenKind::Ampersand => (BinOp::BitAnd, 6, 6),
        TokenKind::ShiftLeft => (BinOp::Shl, 7, 7),
        TokenKind::ShiftRight => (BinOp::Shr, 7, 7),
        TokenKind::Concat => (BinOp::Concat, 9, 8),
        TokenKind::Plus => (BinOp::Add, 10, 10),
        TokenKind::Minus => (BinOp::Sub, 10, 10),
        TokenKind::Star => (BinOp::Mul, 11, 11),
        TokenKind::Slash => (BinOp::Div, 11, 11),
        TokenKind::DoubleSlash => (BinOp::IDiv, 11, 11),
        TokenKind::Percent => (BinOp::Mod, 11, 11),
        TokenKind::Caret => (BinOp::Pow, 14, 13),
        _ => return None,
    };
    Some(entry)
}
