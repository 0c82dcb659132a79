//! Target code generation.
mod assembly;
mod compiler;

pub use assembly::*;
pub use compiler::compile;
