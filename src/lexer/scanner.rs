//! Scanner for Vesper source code.

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// The lexer transforms source code into a stream of tokens.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
    start_pos: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan all tokens from the source. The returned stream always ends
    /// with a single `Eof` token.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.scan_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Scan the next token.
    pub fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace();
        self.mark_start();

        let Some((_, c)) = self.advance() else {
            return Ok(Token::eof(self.current_pos, self.line, self.column));
        };

        match c {
            '(' => Ok(self.make_token(TokenKind::LeftParen)),
            ')' => Ok(self.make_token(TokenKind::RightParen)),
            '{' => Ok(self.make_token(TokenKind::LeftBrace)),
            '}' => Ok(self.make_token(TokenKind::RightBrace)),
            '[' => Ok(self.make_token(TokenKind::LeftBracket)),
            ']' => Ok(self.make_token(TokenKind::RightBracket)),
            ',' => Ok(self.make_token(TokenKind::Comma)),
            ':' => Ok(self.make_token(TokenKind::Colon)),
            ';' => Ok(self.make_token(TokenKind::Semicolon)),
            '+' => Ok(self.make_token(TokenKind::Plus)),
            '-' => Ok(self.make_token(TokenKind::Minus)),
            '*' => Ok(self.make_token(TokenKind::Star)),
            '/' => Ok(self.make_token(TokenKind::Slash)),
            '<' => Ok(self.make_token(TokenKind::Less)),
            '>' => Ok(self.make_token(TokenKind::Greater)),
            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::EqualEqual))
                } else {
                    Ok(self.make_token(TokenKind::Equal))
                }
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual))
                } else {
                    Ok(self.make_token(TokenKind::Bang))
                }
            }
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => Ok(self.scan_number()),
            c if is_ident_start(c) => Ok(self.scan_identifier()),
            c => Err(LexerError::UnexpectedChar(c, self.current_span())),
        }
    }

    /// Scan a string literal. The opening `"` has been consumed. Bytes
    /// between the quotes are taken verbatim: no escape processing.
    fn scan_string(&mut self) -> Result<Token, LexerError> {
        let content_start = self.current_pos;
        loop {
            match self.advance() {
                Some((_, '"')) => break,
                Some(_) => {}
                None => return Err(LexerError::UnterminatedString(self.current_span())),
            }
        }
        let content = &self.source[content_start..self.current_pos - 1];
        Ok(self.make_token(TokenKind::StringLiteral(content.to_string())))
    }

    /// Scan an integer literal. The first digit has been consumed.
    fn scan_number(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let literal = &self.source[self.start_pos..self.current_pos];
        self.make_token(TokenKind::IntLiteral(literal.to_string()))
    }

    /// Scan an identifier or keyword. The first character has been consumed.
    fn scan_identifier(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.advance();
        }
        let text = &self.source[self.start_pos..self.current_pos];
        let kind = TokenKind::keyword(text)
            .unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        self.make_token(kind)
    }

    // ===== Character plumbing =====

    fn advance(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((pos, c)) = next {
            self.current_pos = pos + c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.advance();
        }
    }

    fn mark_start(&mut self) {
        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.current_span())
    }

    fn current_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_tokens()
            .expect("lexer error")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_full_token_stream() {
        let source = r#"
            let five = 5;
            let add = fn(x, y) { x + y; };
            let result = add(five, 10);
            !-/*5;
            5 < 10 > 5;
            if (5 < 10) { return true; } else { return false; }
            10 == 10;
            10 != 9;
            "foobar"
            [1, 2];
            {"foo": "bar"}
        "#;

        use TokenKind::*;
        let expected = vec![
            Let,
            Identifier("five".into()),
            Equal,
            IntLiteral("5".into()),
            Semicolon,
            Let,
            Identifier("add".into()),
            Equal,
            Fn,
            LeftParen,
            Identifier("x".into()),
            Comma,
            Identifier("y".into()),
            RightParen,
            LeftBrace,
            Identifier("x".into()),
            Plus,
            Identifier("y".into()),
            Semicolon,
            RightBrace,
            Semicolon,
            Let,
            Identifier("result".into()),
            Equal,
            Identifier("add".into()),
            LeftParen,
            Identifier("five".into()),
            Comma,
            IntLiteral("10".into()),
            RightParen,
            Semicolon,
            Bang,
            Minus,
            Slash,
            Star,
            IntLiteral("5".into()),
            Semicolon,
            IntLiteral("5".into()),
            Less,
            IntLiteral("10".into()),
            Greater,
            IntLiteral("5".into()),
            Semicolon,
            If,
            LeftParen,
            IntLiteral("5".into()),
            Less,
            IntLiteral("10".into()),
            RightParen,
            LeftBrace,
            Return,
            BoolLiteral(true),
            Semicolon,
            RightBrace,
            Else,
            LeftBrace,
            Return,
            BoolLiteral(false),
            Semicolon,
            RightBrace,
            IntLiteral("10".into()),
            EqualEqual,
            IntLiteral("10".into()),
            Semicolon,
            IntLiteral("10".into()),
            BangEqual,
            IntLiteral("9".into()),
            Semicolon,
            StringLiteral("foobar".into()),
            LeftBracket,
            IntLiteral("1".into()),
            Comma,
            IntLiteral("2".into()),
            RightBracket,
            Semicolon,
            LeftBrace,
            StringLiteral("foo".into()),
            Colon,
            StringLiteral("bar".into()),
            RightBrace,
            Eof,
        ];

        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn test_string_no_escape_processing() {
        let tokens = kinds(r#""hello \n world""#);
        assert_eq!(
            tokens[0],
            TokenKind::StringLiteral("hello \\n world".into())
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Scanner::new("\"oops").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::UnterminatedString(_)));
    }

    #[test]
    fn test_unexpected_char() {
        let err = Scanner::new("let a = 1 @").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::UnexpectedChar('@', _)));
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = Scanner::new("let\nx").scan_tokens().unwrap();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.column, 1);
    }
}
