//! Core parser struct and token plumbing.

use crate::ast::Program;
use crate::error::ParserError;
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

/// The parser for Vesper.
///
/// Syntactic errors accumulate in `errors` rather than aborting the
/// parse; `parse` returns whatever program it could build and callers
/// check [`Parser::errors`] before proceeding.
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) current: usize,
    pub(crate) errors: Vec<ParserError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    /// Parse a complete program.
    pub fn parse(&mut self) -> Program {
        let mut statements = Vec::new();

        while !self.cur_is(&TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.next_token();
        }

        Program::new(statements)
    }

    pub fn errors(&self) -> &[ParserError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ParserError> {
        std::mem::take(&mut self.errors)
    }

    // ===== Token plumbing =====
    //
    // Two tokens of lookahead: `cur` is the token being parsed, `peek`
    // the one after it. The token stream always ends in Eof; `cur` never
    // advances past it.

    pub(crate) fn cur(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn peek(&self) -> &Token {
        let index = if self.current + 1 < self.tokens.len() {
            self.current + 1
        } else {
            self.tokens.len() - 1
        };
        &self.tokens[index]
    }

    pub(crate) fn next_token(&mut self) {
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
    }

    pub(crate) fn cur_is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.cur().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn peek_is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    /// Advance if `peek` matches, otherwise record an error and stay put.
    pub(crate) fn expect_peek(&mut self, kind: &TokenKind) -> bool {
        if self.peek_is(kind) {
            self.next_token();
            true
        } else {
            self.errors.push(ParserError::unexpected_token(
                kind.to_string(),
                self.peek().kind.to_string(),
                self.peek().span,
            ));
            false
        }
    }

    /// Advance if `peek` is an identifier and return its name.
    pub(crate) fn expect_peek_identifier(&mut self) -> Option<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.next_token();
                Some(name)
            }
            other => {
                self.errors.push(ParserError::unexpected_token(
                    "identifier",
                    other.to_string(),
                    self.peek().span,
                ));
                None
            }
        }
    }

    pub(crate) fn cur_span(&self) -> Span {
        self.cur().span
    }
}
