//! Contains the [`Span`] type, which describes source code positions.
use std::fmt::{self, Debug};

/// A byte range in the source text.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Span {
    start: usize,
    end: usize,
}
impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn length(&self) -> usize {
        self.end - self.start
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Combine two spans into one covering both.
    pub fn to(&self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }

    pub fn lookup<'t>(&self, target: &'t str) -> &'t str {
        &target[self.start..self.end]
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
