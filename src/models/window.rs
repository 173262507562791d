//! Chunk windows.

use serde::{Deserialize, Serialize};

/// A request to process data rows `[offset, offset + limit)` of a file.
///
/// Offsets address data rows after the header. Windows for one job never
/// overlap and advance monotonically; the orchestrator sequences them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkWindow {
    /// Staged file the window reads from.
    pub file_name: String,
    /// First data row (0-based).
    pub offset: usize,
    /// Maximum number of rows, always greater than zero.
    pub limit: usize,
}

impl ChunkWindow {
    /// Creates a window.
    #[must_use]
    pub fn new(file_name: impl Into<String>, offset: usize, limit: usize) -> Self {
        Self {
            file_name: file_name.into(),
            offset,
            limit,
        }
    }

    /// Exclusive end of the window.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    /// The window immediately following this one, with the same limit.
    #[must_use]
    pub fn next(&self) -> Self {
        Self::new(self.file_name.clone(), self.end(), self.limit)
    }

    /// Returns whether two windows share any row.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_end_and_next() {
        let w = ChunkWindow::new("users.csv", 0, 10);
        assert_eq!(w.end(), 10);

        let next = w.next();
        assert_eq!(next.offset, 10);
        assert_eq!(next.limit, 10);
        assert!(!w.overlaps(&next));
    }

    #[test]
    fn test_window_overlap() {
        let a = ChunkWindow::new("f", 0, 10);
        let b = ChunkWindow::new("f", 5, 10);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }
}
