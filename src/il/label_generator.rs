use super::Label;

/// Mints fresh jump labels, numbered from 1 within a lowering run.
pub struct LabelGenerator {
    index: usize,
}

impl LabelGenerator {
    pub fn new() -> Self {
        Self { index: 0 }
    }

    /// Generates a new unique label.
    pub fn next_label(&mut self) -> Label {
        self.index += 1;
        Label::new(self.index)
    }
}
