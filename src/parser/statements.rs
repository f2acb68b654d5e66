//! Statement parsing: let, return, expression statements, blocks.

use crate::ast::{Block, Stmt, StmtKind};
use crate::lexer::TokenKind;
use crate::parser::core::Parser;
use crate::parser::precedence::Precedence;

impl Parser {
    /// Parse one statement. Leaves `cur` on the statement's last token.
    /// Returns `None` after recording an error; the caller resynchronizes
    /// by advancing.
    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        match self.cur().kind.clone() {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    /// `let IDENT = EXPR;`
    fn parse_let_statement(&mut self) -> Option<Stmt> {
        let start = self.cur_span();

        let name = self.expect_peek_identifier()?;
        if !self.expect_peek(&TokenKind::Equal) {
            return None;
        }

        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;

        if self.peek_is(&TokenKind::Semicolon) {
            self.next_token();
        }

        let span = start.to(self.cur_span());
        Some(Stmt::new(StmtKind::Let { name, value }, span))
    }

    /// `return EXPR;`
    fn parse_return_statement(&mut self) -> Option<Stmt> {
        let start = self.cur_span();

        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;

        if self.peek_is(&TokenKind::Semicolon) {
            self.next_token();
        }

        let span = start.to(self.cur_span());
        Some(Stmt::new(StmtKind::Return(value), span))
    }

    /// A bare expression; the trailing semicolon is optional.
    fn parse_expression_statement(&mut self) -> Option<Stmt> {
        let expr = self.parse_expression(Precedence::Lowest)?;

        if self.peek_is(&TokenKind::Semicolon) {
            self.next_token();
        }

        let span = expr.span;
        Some(Stmt::new(StmtKind::Expression(expr), span))
    }

    /// Parse a braced block. `cur` must be on `{`; leaves `cur` on `}`.
    pub(crate) fn parse_block(&mut self) -> Block {
        let start = self.cur_span();
        let mut statements = Vec::new();

        self.next_token();
        while !self.cur_is(&TokenKind::RightBrace) && !self.cur_is(&TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.next_token();
        }

        Block::new(statements, start.to(self.cur_span()))
    }
}
