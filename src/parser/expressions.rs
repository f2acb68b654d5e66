//! Pratt expression parsing: prefix and infix dispatch.

use crate::ast::{Expr, ExprKind, InfixOp, PrefixOp};
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::parser::core::Parser;
use crate::parser::precedence::{get_precedence, Precedence};

impl Parser {
    /// Parse an expression at the given minimum precedence. `cur` must be
    /// on the expression's first token; leaves `cur` on its last.
    pub(crate) fn parse_expression(&mut self, precedence: Precedence) -> Option<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(&TokenKind::Semicolon)
            && precedence < get_precedence(&self.peek().kind)
        {
            self.next_token();
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    /// Dispatch on `cur` in prefix position.
    fn parse_prefix(&mut self) -> Option<Expr> {
        let span = self.cur_span();
        match self.cur().kind.clone() {
            TokenKind::Identifier(name) => Some(Expr::new(ExprKind::Identifier(name), span)),
            TokenKind::IntLiteral(literal) => match literal.parse::<i64>() {
                Ok(value) => Some(Expr::new(ExprKind::IntegerLiteral(value), span)),
                Err(_) => {
                    self.errors.push(ParserError::invalid_integer(literal, span));
                    None
                }
            },
            TokenKind::StringLiteral(value) => {
                Some(Expr::new(ExprKind::StringLiteral(value), span))
            }
            TokenKind::BoolLiteral(value) => {
                Some(Expr::new(ExprKind::BooleanLiteral(value), span))
            }
            TokenKind::Bang => self.parse_prefix_expression(PrefixOp::Bang),
            TokenKind::Minus => self.parse_prefix_expression(PrefixOp::Minus),
            TokenKind::LeftParen => self.parse_grouped_expression(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Fn => self.parse_function_literal(),
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_hash_literal(),
            other => {
                self.errors
                    .push(ParserError::no_prefix_parse(other.to_string(), span));
                None
            }
        }
    }

    /// Dispatch on `cur` in infix position. `left` is the already-parsed
    /// operand; `cur` is the operator token.
    fn parse_infix(&mut self, left: Expr) -> Option<Expr> {
        match self.cur().kind.clone() {
            TokenKind::LeftParen => self.parse_call_expression(left),
            TokenKind::LeftBracket => self.parse_index_expression(left),
            TokenKind::Plus => self.parse_infix_expression(left, InfixOp::Add),
            TokenKind::Minus => self.parse_infix_expression(left, InfixOp::Sub),
            TokenKind::Star => self.parse_infix_expression(left, InfixOp::Mul),
            TokenKind::Slash => self.parse_infix_expression(left, InfixOp::Div),
            TokenKind::Less => self.parse_infix_expression(left, InfixOp::Lt),
            TokenKind::Greater => self.parse_infix_expression(left, InfixOp::Gt),
            TokenKind::EqualEqual => self.parse_infix_expression(left, InfixOp::Eq),
            TokenKind::BangEqual => self.parse_infix_expression(left, InfixOp::NotEq),
            // Unreachable while get_precedence and this match agree.
            _ => Some(left),
        }
    }

    fn parse_prefix_expression(&mut self, operator: PrefixOp) -> Option<Expr> {
        let start = self.cur_span();
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        let span = start.to(right.span);
        Some(Expr::new(
            ExprKind::Prefix {
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn parse_infix_expression(&mut self, left: Expr, operator: InfixOp) -> Option<Expr> {
        let precedence = get_precedence(&self.cur().kind);
        self.next_token();
        let right = self.parse_expression(precedence)?;
        let span = left.span.to(right.span);
        Some(Expr::new(
            ExprKind::Infix {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn parse_grouped_expression(&mut self) -> Option<Expr> {
        self.next_token();
        let expr = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(&TokenKind::RightParen) {
            return None;
        }
        Some(expr)
    }

    /// `if ( cond ) { block } [else { block }]`; the parentheses are
    /// required.
    fn parse_if_expression(&mut self) -> Option<Expr> {
        let start = self.cur_span();

        if !self.expect_peek(&TokenKind::LeftParen) {
            return None;
        }
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(&TokenKind::RightParen) {
            return None;
        }
        if !self.expect_peek(&TokenKind::LeftBrace) {
            return None;
        }
        let consequence = self.parse_block();

        let alternative = if self.peek_is(&TokenKind::Else) {
            self.next_token();
            if !self.expect_peek(&TokenKind::LeftBrace) {
                return None;
            }
            Some(self.parse_block())
        } else {
            None
        };

        let span = start.to(self.cur_span());
        Some(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                consequence,
                alternative,
            },
            span,
        ))
    }

    /// `fn ( ident (, ident)* ) { block }` with an empty parameter list allowed.
    fn parse_function_literal(&mut self) -> Option<Expr> {
        let start = self.cur_span();

        if !self.expect_peek(&TokenKind::LeftParen) {
            return None;
        }
        let parameters = self.parse_function_parameters()?;
        if !self.expect_peek(&TokenKind::LeftBrace) {
            return None;
        }
        let body = self.parse_block();

        let span = start.to(self.cur_span());
        Some(Expr::new(
            ExprKind::FunctionLiteral { parameters, body },
            span,
        ))
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<String>> {
        let mut parameters = Vec::new();

        if self.peek_is(&TokenKind::RightParen) {
            self.next_token();
            return Some(parameters);
        }

        parameters.push(self.expect_peek_identifier()?);
        while self.peek_is(&TokenKind::Comma) {
            self.next_token();
            parameters.push(self.expect_peek_identifier()?);
        }

        if !self.expect_peek(&TokenKind::RightParen) {
            return None;
        }
        Some(parameters)
    }

    fn parse_call_expression(&mut self, callee: Expr) -> Option<Expr> {
        let arguments = self.parse_expression_list(&TokenKind::RightParen)?;
        let span = callee.span.to(self.cur_span());
        Some(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            span,
        ))
    }

    fn parse_index_expression(&mut self, left: Expr) -> Option<Expr> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(&TokenKind::RightBracket) {
            return None;
        }
        let span = left.span.to(self.cur_span());
        Some(Expr::new(
            ExprKind::Index {
                left: Box::new(left),
                index: Box::new(index),
            },
            span,
        ))
    }

    fn parse_array_literal(&mut self) -> Option<Expr> {
        let start = self.cur_span();
        let elements = self.parse_expression_list(&TokenKind::RightBracket)?;
        let span = start.to(self.cur_span());
        Some(Expr::new(ExprKind::ArrayLiteral(elements), span))
    }

    /// `{ expr : expr (, expr : expr)* }`; empty `{}` is allowed. Pairs keep
    /// source order; the compiler sorts them.
    fn parse_hash_literal(&mut self) -> Option<Expr> {
        let start = self.cur_span();
        let mut pairs = Vec::new();

        while !self.peek_is(&TokenKind::RightBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;
            if !self.expect_peek(&TokenKind::Colon) {
                return None;
            }
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.peek_is(&TokenKind::RightBrace) && !self.expect_peek(&TokenKind::Comma) {
                return None;
            }
        }

        if !self.expect_peek(&TokenKind::RightBrace) {
            return None;
        }

        let span = start.to(self.cur_span());
        Some(Expr::new(ExprKind::HashLiteral(pairs), span))
    }

    /// A comma-separated expression list up to `end`. `cur` must be on the
    /// opening delimiter; leaves `cur` on `end`.
    fn parse_expression_list(&mut self, end: &TokenKind) -> Option<Vec<Expr>> {
        let mut list = Vec::new();

        if self.peek_is(end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_is(&TokenKind::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }
        Some(list)
    }
}
