//! Generic logic for code listings (TAC, assembly).
mod generic_listing;
mod position;

pub use generic_listing::*;
pub use position::*;
