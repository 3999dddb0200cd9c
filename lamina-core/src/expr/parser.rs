//! Expression parser
//!
//! Recursive-descent with one level per precedence tier. Pipes bind loosest,
//! then ternary, logic, equality, comparison, additive, multiplicative,
//! unary, postfix (member/index), primary.

use super::ast::{BinaryOp, Expr, ForHead, ForeachHead, UnaryOp};
use super::error::{unexpected_token, ExprError, ExprErrorKind, ExprResult};
use super::lexer::tokenize;
use super::token::{Token, TokenKind};

/// Expression parser over a token buffer.
pub struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    input_len: usize,
    allow_pipes: bool,
}

impl ExprParser {
    /// Tokenize and wrap an expression string.
    pub fn new(input: &str, allow_pipes: bool) -> ExprResult<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
            input_len: input.len(),
            allow_pipes,
        })
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse_expression(input: &str, allow_pipes: bool) -> ExprResult<Expr> {
        let mut parser = Self::new(input, allow_pipes)?;
        let expr = parser.expression()?;
        parser.expect_end()?;
        Ok(expr)
    }

    /// Parse a comma-separated argument list (possibly empty).
    pub fn parse_call_args(input: &str, allow_pipes: bool) -> ExprResult<Vec<Expr>> {
        let mut parser = Self::new(input, allow_pipes)?;
        let mut args = Vec::new();
        if parser.peek().is_some() {
            args.push(parser.expression()?);
            while parser.eat(&TokenKind::Comma) {
                args.push(parser.expression()?);
            }
        }
        parser.expect_end()?;
        Ok(args)
    }

    /// Parse a `@foreach` head: `subject as value` / `subject as key => value`.
    pub fn parse_foreach_head(input: &str, allow_pipes: bool) -> ExprResult<ForeachHead> {
        let mut parser = Self::new(input, allow_pipes)?;
        let subject = parser.expression()?;
        parser.expect(&TokenKind::As, "'as'")?;
        let first = parser.expect_ident()?;
        let head = if parser.eat(&TokenKind::FatArrow) {
            let value = parser.expect_ident()?;
            ForeachHead {
                subject,
                key_var: Some(first),
                value_var: value,
            }
        } else {
            ForeachHead {
                subject,
                key_var: None,
                value_var: first,
            }
        };
        parser.expect_end()?;
        Ok(head)
    }

    /// Parse a `@for` head: `var in start..end`.
    pub fn parse_for_head(input: &str, allow_pipes: bool) -> ExprResult<ForHead> {
        let mut parser = Self::new(input, allow_pipes)?;
        let var = parser.expect_ident()?;
        parser.expect(&TokenKind::In, "'in'")?;
        let start = parser.expression()?;
        parser.expect(&TokenKind::DotDot, "'..'")?;
        let end = parser.expression()?;
        parser.expect_end()?;
        Ok(ForHead { var, start, end })
    }

    /// Parse `@include` arguments: `target` or `target, data`.
    pub fn parse_include_args(input: &str, allow_pipes: bool) -> ExprResult<(Expr, Option<Expr>)> {
        let mut parser = Self::new(input, allow_pipes)?;
        let target = parser.expression()?;
        let data = if parser.eat(&TokenKind::Comma) {
            Some(parser.expression()?)
        } else {
            None
        };
        parser.expect_end()?;
        Ok((target, data))
    }

    // --- precedence tiers ---

    fn expression(&mut self) -> ExprResult<Expr> {
        self.pipeline()
    }

    fn pipeline(&mut self) -> ExprResult<Expr> {
        let mut expr = self.ternary()?;
        while self.check(&TokenKind::Pipe) {
            let pipe_offset = self.current_offset();
            self.advance();
            if !self.allow_pipes {
                return Err(ExprError::new(ExprErrorKind::PipesDisabled, pipe_offset));
            }
            let filter = self.expect_ident()?;
            let args = if self.eat(&TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    args.push(self.expression()?);
                    while self.eat(&TokenKind::Comma) {
                        args.push(self.expression()?);
                    }
                }
                self.expect(&TokenKind::RParen, "')'")?;
                args
            } else {
                Vec::new()
            };
            expr = Expr::Pipe {
                input: Box::new(expr),
                filter,
                args,
            };
        }
        Ok(expr)
    }

    fn ternary(&mut self) -> ExprResult<Expr> {
        let cond = self.logic_or()?;
        if self.eat(&TokenKind::Question) {
            let then = self.ternary()?;
            self.expect(&TokenKind::Colon, "':'")?;
            let otherwise = self.ternary()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn logic_or(&mut self) -> ExprResult<Expr> {
        let mut left = self.logic_and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.logic_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn logic_and(&mut self) -> ExprResult<Expr> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> ExprResult<Expr> {
        let mut left = self.comparison()?;
        loop {
            let op = if self.eat(&TokenKind::EqEq) {
                BinaryOp::Eq
            } else if self.eat(&TokenKind::BangEq) {
                BinaryOp::Ne
            } else {
                break;
            };
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> ExprResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = if self.eat(&TokenKind::Le) {
                BinaryOp::Le
            } else if self.eat(&TokenKind::Lt) {
                BinaryOp::Lt
            } else if self.eat(&TokenKind::Ge) {
                BinaryOp::Ge
            } else if self.eat(&TokenKind::Gt) {
                BinaryOp::Gt
            } else {
                break;
            };
            let right = self.term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> ExprResult<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = if self.eat(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.eat(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn factor(&mut self) -> ExprResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.eat(&TokenKind::Slash) {
                BinaryOp::Div
            } else if self.eat(&TokenKind::Percent) {
                BinaryOp::Rem
            } else {
                break;
            };
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> ExprResult<Expr> {
        if self.eat(&TokenKind::Bang) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.eat(&TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> ExprResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let field = self.expect_ident()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    field,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> ExprResult<Expr> {
        let token = match self.advance() {
            Some(token) => token,
            None => {
                return Err(ExprError::at_end(
                    ExprErrorKind::UnexpectedEnd,
                    self.input_len,
                ))
            }
        };

        match token.kind {
            TokenKind::Int(i) => Ok(Expr::int(i)),
            TokenKind::Float(f) => Ok(Expr::Literal(crate::value::Value::Float(f))),
            TokenKind::Str(s) => Ok(Expr::str(s)),
            TokenKind::True => Ok(Expr::Literal(crate::value::Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(crate::value::Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(crate::value::Value::Null)),
            TokenKind::Ident(name) => Ok(Expr::Var(name)),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    items.push(self.expression()?);
                    while self.eat(&TokenKind::Comma) {
                        items.push(self.expression()?);
                    }
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                Ok(Expr::Array(items))
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                if !self.check(&TokenKind::RBrace) {
                    loop {
                        let key = self.expect_map_key()?;
                        self.expect(&TokenKind::Colon, "':'")?;
                        let value = self.expression()?;
                        entries.push((key, value));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBrace, "'}'")?;
                Ok(Expr::Map(entries))
            }
            other => Err(ExprError::new(
                unexpected_token(other.describe(), vec!["expression"]),
                token.offset,
            )),
        }
    }

    // --- token helpers ---

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().map(|t| &t.kind == kind).unwrap_or(false)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> ExprResult<()> {
        if self.eat(kind) {
            return Ok(());
        }
        match self.peek() {
            Some(token) => Err(ExprError::new(
                unexpected_token(token.kind.describe(), vec![what]),
                token.offset,
            )),
            None => Err(ExprError::at_end(
                ExprErrorKind::UnexpectedEnd,
                self.input_len,
            )),
        }
    }

    fn expect_ident(&mut self) -> ExprResult<String> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Ok(name),
            Some(token) => Err(ExprError::new(
                ExprErrorKind::ExpectedIdentifier {
                    found: token.kind.describe(),
                },
                token.offset,
            )),
            None => Err(ExprError::at_end(
                ExprErrorKind::UnexpectedEnd,
                self.input_len,
            )),
        }
    }

    fn expect_map_key(&mut self) -> ExprResult<String> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Ok(name),
            Some(Token {
                kind: TokenKind::Str(text),
                ..
            }) => Ok(text),
            Some(token) => Err(ExprError::new(
                ExprErrorKind::ExpectedIdentifier {
                    found: token.kind.describe(),
                },
                token.offset,
            )),
            None => Err(ExprError::at_end(
                ExprErrorKind::UnexpectedEnd,
                self.input_len,
            )),
        }
    }

    fn expect_end(&self) -> ExprResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(ExprError::new(
                ExprErrorKind::TrailingInput {
                    found: token.kind.describe(),
                },
                token.offset,
            )),
        }
    }

    fn current_offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.input_len)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
