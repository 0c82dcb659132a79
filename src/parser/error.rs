//! Error handling for parsing.
use thiserror::Error;

use crate::{error::PositionalError, span::Span};

/// A parsing error: the reason plus the source range it points at.
#[derive(Debug)]
pub struct ParseError {
    reason: Reason,
    span: Span,
}

impl ParseError {
    pub fn new(reason: Reason, span: Span) -> Self {
        Self { reason, span }
    }

    pub fn reason(&self) -> &Reason {
        &self.reason
    }
}

impl PositionalError for ParseError {
    fn range(&self) -> Span {
        self.span
    }

    fn describe(&self) -> String {
        self.reason.to_string()
    }
}

#[derive(Debug, Error)]
pub enum Reason {
    #[error("expected {expected} but found {found}")]
    Expected { expected: String, found: String },
    #[error("unexpected {0} in statement")]
    UnexpectedStatement(String),
    #[error("unexpected {0} in expression")]
    UnexpectedExpression(String),
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
}
