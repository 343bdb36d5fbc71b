use crate::{
    ast::{BinaryOp, Block, Expr, ExprKind, Literal, Program, Stmt, StmtKind, UnaryOp},
    diagnostics::{Diagnostic, ErrorKind},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

/// Lex and parse one source file into a program.
pub fn parse_source(source: &str, file: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source, file).tokenize()?;
    Parser::new(tokens, file).parse()
}

/// Recursive-descent parser over the token stream with an index cursor.
struct Parser<'a> {
    tokens: Vec<Token>,
    file: &'a str,
    current: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, file: &'a str) -> Self {
        Self {
            tokens,
            file,
            current: 0,
        }
    }

    fn parse(&mut self) -> Result<Program, Diagnostic> {
        let start = self.peek().clone();
        let mut body = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            body.push(self.statement()?);
        }
        Ok(Program { body, token: start })
    }

    fn statement(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.peek().clone();

        if self.matches(&TokenKind::Semicolon) {
            return Ok(Stmt {
                kind: StmtKind::Empty,
                token,
            });
        }

        if self.matches_keyword(Keyword::Import) {
            let path = self.expect_str()?;
            self.expect(TokenKind::Semicolon)?;
            return Ok(Stmt {
                kind: StmtKind::Import(path),
                token,
            });
        }

        if self.matches_keyword(Keyword::Let) {
            let name = self.expect_ident()?;
            self.expect_op('=')?;
            let init = self.expression()?;
            self.expect(TokenKind::Semicolon)?;
            return Ok(Stmt {
                kind: StmtKind::Let { name, init },
                token,
            });
        }

        if self.matches_keyword(Keyword::Fn) {
            let name = self.expect_ident()?;
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            if self.peek().kind != TokenKind::RParen {
                params.push(self.expect_ident()?);
                while self.matches(&TokenKind::Comma) {
                    params.push(self.expect_ident()?);
                }
            }
            self.expect(TokenKind::RParen)?;
            let body = self.block()?;
            return Ok(Stmt {
                kind: StmtKind::Function { name, params, body },
                token,
            });
        }

        if self.matches_keyword(Keyword::Return) {
            if self.matches(&TokenKind::Semicolon) {
                return Ok(Stmt {
                    kind: StmtKind::Return(None),
                    token,
                });
            }
            let expr = self.expression()?;
            self.expect(TokenKind::Semicolon)?;
            return Ok(Stmt {
                kind: StmtKind::Return(Some(expr)),
                token,
            });
        }

        if self.matches_keyword(Keyword::Break) {
            self.expect(TokenKind::Semicolon)?;
            return Ok(Stmt {
                kind: StmtKind::Break,
                token,
            });
        }

        if self.matches_keyword(Keyword::Continue) {
            self.expect(TokenKind::Semicolon)?;
            return Ok(Stmt {
                kind: StmtKind::Continue,
                token,
            });
        }

        if self.matches_keyword(Keyword::If) {
            let cond = self.expression()?;
            let then_block = self.block()?;
            let else_block = if self.matches_keyword(Keyword::Else) {
                Some(self.block()?)
            } else {
                None
            };
            return Ok(Stmt {
                kind: StmtKind::If {
                    cond,
                    then_block,
                    else_block,
                },
                token,
            });
        }

        if self.matches_keyword(Keyword::While) {
            let cond = self.expression()?;
            let body = self.block()?;
            return Ok(Stmt {
                kind: StmtKind::While { cond, body },
                token,
            });
        }

        if self.matches_keyword(Keyword::For) {
            let name = self.expect_ident()?;
            self.expect_keyword(Keyword::In)?;
            self.expect_keyword(Keyword::Range)?;
            self.expect(TokenKind::LParen)?;
            let start = self.expression()?;
            self.expect(TokenKind::Comma)?;
            let end = self.expression()?;
            self.expect(TokenKind::RParen)?;
            let body = self.block()?;
            return Ok(Stmt {
                kind: StmtKind::ForRange {
                    name,
                    start,
                    end,
                    body,
                },
                token,
            });
        }

        // Assignment or bare expression statement. `=` exists only at
        // statement level, never as a sub-expression.
        let expr = self.expression()?;
        if self.matches(&TokenKind::Op('=')) {
            if !matches!(expr.kind, ExprKind::Var(_) | ExprKind::Index { .. }) {
                return Err(
                    Diagnostic::new(ErrorKind::Parse, "Invalid assignment target").at(
                        self.file,
                        expr.token.line,
                        expr.token.col,
                    ),
                );
            }
            let value = self.expression()?;
            self.expect(TokenKind::Semicolon)?;
            return Ok(Stmt {
                kind: StmtKind::Assign {
                    target: expr,
                    value,
                },
                token,
            });
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt {
            kind: StmtKind::Expr(expr),
            token,
        })
    }

    fn block(&mut self) -> Result<Block, Diagnostic> {
        let token = self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while self.peek().kind != TokenKind::RBrace && self.peek().kind != TokenKind::Eof {
            body.push(self.statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block { body, token })
    }

    // Expression precedence tiers, lowest to highest.

    fn expression(&mut self) -> Result<Expr, Diagnostic> {
        self.logic_or()
    }

    fn logic_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.logic_and()?;
        while self.matches_keyword(Keyword::Or) {
            let op_token = self.previous().clone();
            let right = self.logic_and()?;
            expr = binary(BinaryOp::Or, expr, right, op_token);
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.equality()?;
        while self.matches_keyword(Keyword::And) {
            let op_token = self.previous().clone();
            let right = self.equality()?;
            expr = binary(BinaryOp::And, expr, right, op_token);
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.comparison()?;
        loop {
            let op = if self.matches(&TokenKind::EqEq) {
                BinaryOp::Eq
            } else if self.matches(&TokenKind::NotEq) {
                BinaryOp::Ne
            } else {
                break;
            };
            let op_token = self.previous().clone();
            let right = self.comparison()?;
            expr = binary(op, expr, right, op_token);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.term()?;
        loop {
            let op = if self.matches(&TokenKind::LessEq) {
                BinaryOp::Le
            } else if self.matches(&TokenKind::GreaterEq) {
                BinaryOp::Ge
            } else if self.matches(&TokenKind::Op('<')) {
                BinaryOp::Lt
            } else if self.matches(&TokenKind::Op('>')) {
                BinaryOp::Gt
            } else {
                break;
            };
            let op_token = self.previous().clone();
            let right = self.term()?;
            expr = binary(op, expr, right, op_token);
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.factor()?;
        loop {
            let op = if self.matches(&TokenKind::Op('+')) {
                BinaryOp::Add
            } else if self.matches(&TokenKind::Op('-')) {
                BinaryOp::Sub
            } else {
                break;
            };
            let op_token = self.previous().clone();
            let right = self.factor()?;
            expr = binary(op, expr, right, op_token);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.unary()?;
        loop {
            let op = if self.matches(&TokenKind::Op('*')) {
                BinaryOp::Mul
            } else if self.matches(&TokenKind::Op('/')) {
                BinaryOp::Div
            } else if self.matches(&TokenKind::Op('%')) {
                BinaryOp::Mod
            } else {
                break;
            };
            let op_token = self.previous().clone();
            let right = self.unary()?;
            expr = binary(op, expr, right, op_token);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = if self.matches(&TokenKind::Op('-')) {
            Some(UnaryOp::Neg)
        } else if self.matches(&TokenKind::Op('!')) {
            Some(UnaryOp::Not)
        } else {
            None
        };
        if let Some(op) = op {
            let op_token = self.previous().clone();
            let expr = self.unary()?;
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
                token: op_token,
            });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&TokenKind::LParen) {
                let mut args = Vec::new();
                if self.peek().kind != TokenKind::RParen {
                    args.push(self.expression()?);
                    while self.matches(&TokenKind::Comma) {
                        args.push(self.expression()?);
                    }
                }
                self.expect(TokenKind::RParen)?;
                let token = expr.token.clone();
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    token,
                };
            } else if self.matches(&TokenKind::LBracket) {
                let key = self.expression()?;
                self.expect(TokenKind::RBracket)?;
                let token = expr.token.clone();
                expr = Expr {
                    kind: ExprKind::Index {
                        obj: Box::new(expr),
                        key: Box::new(key),
                    },
                    token,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Int(n) => {
                let n = *n;
                self.advance();
                Ok(literal(Literal::Int(n), token))
            }
            TokenKind::Float(f) => {
                let f = *f;
                self.advance();
                Ok(literal(Literal::Float(f), token))
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.advance();
                Ok(literal(Literal::Str(s), token))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(literal(Literal::Bool(true), token))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(literal(Literal::Bool(false), token))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(literal(Literal::Null, token))
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Var(name),
                    token,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if self.peek().kind != TokenKind::RBracket {
                    items.push(self.expression()?);
                    while self.matches(&TokenKind::Comma) {
                        items.push(self.expression()?);
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr {
                    kind: ExprKind::ListLiteral(items),
                    token,
                })
            }
            // A leading `{` in expression position is always a map literal;
            // statement blocks only appear where control flow asks for one.
            TokenKind::LBrace => {
                self.advance();
                let mut items = Vec::new();
                if self.peek().kind != TokenKind::RBrace {
                    items.push(self.map_entry()?);
                    while self.matches(&TokenKind::Comma) {
                        items.push(self.map_entry()?);
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Ok(Expr {
                    kind: ExprKind::MapLiteral(items),
                    token,
                })
            }
            _ => Err(self.error(&token, format!("Unexpected token {}", token.kind.describe()))),
        }
    }

    fn map_entry(&mut self) -> Result<(String, Expr), Diagnostic> {
        let key = self.expect_str()?;
        self.expect(TokenKind::Colon)?;
        let value = self.expression()?;
        Ok((key, value))
    }

    // Cursor helpers.

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.current)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with Eof"))
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(&TokenKind::Keyword(keyword))
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        let token = self.peek().clone();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(
                &token,
                format!(
                    "Expected {}, got {}",
                    kind.describe(),
                    token.kind.describe()
                ),
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        self.expect(TokenKind::Keyword(keyword))
    }

    fn expect_op(&mut self, ch: char) -> Result<Token, Diagnostic> {
        self.expect(TokenKind::Op(ch))
    }

    fn expect_ident(&mut self) -> Result<String, Diagnostic> {
        let token = self.peek().clone();
        if let TokenKind::Ident(name) = &token.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error(
                &token,
                format!("Expected identifier, got {}", token.kind.describe()),
            ))
        }
    }

    fn expect_str(&mut self) -> Result<String, Diagnostic> {
        let token = self.peek().clone();
        if let TokenKind::Str(value) = &token.kind {
            let value = value.clone();
            self.advance();
            Ok(value)
        } else {
            Err(self.error(
                &token,
                format!("Expected string literal, got {}", token.kind.describe()),
            ))
        }
    }

    fn error(&self, token: &Token, message: String) -> Diagnostic {
        Diagnostic::new(ErrorKind::Parse, message).at(self.file, token.line, token.col)
    }
}

fn literal(value: Literal, token: Token) -> Expr {
    Expr {
        kind: ExprKind::Literal(value),
        token,
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr, token: Token) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        token,
    }
}
