use thiserror::Error;

use crate::{ast::TypeSpec, error::PositionalError, span::Span};

/// An error as produced by the type checker.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct TypeError {
    kind: TypeErrorKind,
    span: Span,
}
impl TypeError {
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &TypeErrorKind {
        &self.kind
    }
}

impl PositionalError for TypeError {
    fn range(&self) -> Span {
        self.span
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeErrorKind {
    #[error("variable '{0}' used before declaration")]
    UnknownIdentifier(String),
    #[error("variable '{0}' redeclared")]
    Redeclaration(String),
    #[error("cannot assign expression of type '{1}' to a variable of type '{0}'")]
    Assign(TypeSpec, TypeSpec),
}
