//! Error handling for lexing.
use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::{error::PositionalError, span::Span};

#[derive(Debug, Error)]
pub enum ErrorType {
    #[error("Invalid number literal: {0}")]
    NumberLiteral(String),
    #[error("Unterminated block comment")]
    UnterminatedComment,
    #[error("Invalid symbol")]
    UnknownToken,
}

#[derive(Error, Debug)]
pub struct LexError {
    pub range: Span,
    pub error_type: ErrorType,
}

impl LexError {
    pub fn new(range: Span, error_type: ErrorType) -> Self {
        Self { range, error_type }
    }

    pub fn length(&self) -> usize {
        self.range.length()
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error_type)
    }
}

impl PositionalError for LexError {
    fn range(&self) -> Span {
        self.range
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}
