//! Validates declarations and types before the tree is lowered.
mod error;
mod type_checker;

pub use error::*;
pub use type_checker::verify_well_typed;
