//! Error types for all pipeline phases.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("unterminated string at {0}")]
    UnterminatedString(Span),
}

impl LexerError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
        }
    }
}

/// Parser errors.
///
/// These accumulate on the parser rather than aborting it; the display
/// strings are the messages the REPL reports verbatim, so spans are kept
/// out of them and exposed through [`ParserError::span`] instead.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("expected next token to be {expected}, got {found} instead")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("no prefix parse function for {found} found")]
    NoPrefixParse { found: String, span: Span },

    #[error("could not parse \"{literal}\" as integer")]
    InvalidInteger { literal: String, span: Span },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn no_prefix_parse(found: impl Into<String>, span: Span) -> Self {
        Self::NoPrefixParse {
            found: found.into(),
            span,
        }
    }

    pub fn invalid_integer(literal: impl Into<String>, span: Span) -> Self {
        Self::InvalidInteger {
            literal: literal.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::NoPrefixParse { span, .. } => *span,
            Self::InvalidInteger { span, .. } => *span,
        }
    }
}

/// Bytecode compilation errors. Terminal for that compile.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String, Span),

    #[error("unknown operator {0}")]
    UnknownOperator(String),

    #[error("too many constants in one compilation unit")]
    TooManyConstants,

    #[error("too many local bindings in one function")]
    TooManyLocals,
}

impl CompileError {
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UndefinedVariable(_, span) => Some(*span),
            _ => None,
        }
    }
}

/// Runtime errors surfaced out-of-band from `Vm::run`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("frame overflow")]
    FrameOverflow,

    #[error("opcode {0} is undefined")]
    UndefinedOpcode(u8),

    #[error("unsupported types for binary operation: {left} {right}")]
    UnsupportedBinaryTypes {
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown string operator: {0}")]
    UnknownStringOperator(&'static str),

    #[error("unknown integer operator: {0}")]
    UnknownIntegerOperator(&'static str),

    #[error("unknown operator: {op} ({left} {right})")]
    UnknownOperator {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("not a function: {0}")]
    NotAFunction(&'static str),

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(&'static str),

    #[error("index operator not supported: {0}")]
    IndexNotSupported(&'static str),

    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArity { want: usize, got: usize },

    #[error("calling non-function")]
    CallingNonFunction,
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum VesperError {
    #[error("lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("parser errors:\n{}", format_parser_errors(.0))]
    Parse(Vec<ParserError>),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_parser_errors(errors: &[ParserError]) -> String {
    errors
        .iter()
        .map(|e| format!("\t{}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
