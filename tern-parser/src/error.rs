// tern-parser - Error types for Tern
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Error types for the value model, hash table and incremental parser.
//!
//! Three families are kept apart on purpose:
//!
//! - [`ParseError`] is a syntax error. The parser records it as pending and
//!   keeps it until the caller takes it with `Parser::error`.
//! - [`ConsumeError`] is a caller mistake: feeding input while an error is
//!   pending or after the parser has died. Retrying does not help.
//! - [`ValueError`] comes out of hashing or comparing values and aborts the
//!   enclosing hash table operation.

use std::fmt;

/// Result type for value-model and hash table operations.
pub type Result<T> = std::result::Result<T, ValueError>;

/// Errors raised while hashing or comparing values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Tuples or structs nested deeper than the supported limit
    NestingTooDeep { limit: usize },
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::NestingTooDeep { limit } => {
                write!(f, "value nesting exceeds depth limit of {}", limit)
            }
        }
    }
}

impl std::error::Error for ValueError {}

/// Syntax error with the position where the parser noticed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Contract violations when feeding the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeError {
    /// The parser reached end of input or hit a fatal internal condition
    Dead,
    /// A syntax error is pending and has not been taken by the caller
    UncheckedError,
}

impl fmt::Display for ConsumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumeError::Dead => write!(f, "parser is dead, cannot consume"),
            ConsumeError::UncheckedError => {
                write!(f, "parser has unchecked error, cannot consume")
            }
        }
    }
}

impl std::error::Error for ConsumeError {}
