//! Functionality for converting a source code string into a [`Token`] stream.
mod error;
mod lexer;

pub mod tokens;

pub use error::*;
pub use lexer::lex;

#[allow(unused_imports)]
use tokens::Token;
