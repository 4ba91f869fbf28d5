#![forbid(unsafe_code)]

//! Caret and selection geometry.
//!
//! Lines and columns are 1-based, matching how editors report caret
//! positions: column `n` sits *before* the `n`-th character of a line, so a
//! line of length `len` has valid columns `1..=len + 1`.

/// A caret position on a text surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based).
    pub column: usize,
}

impl Position {
    /// Create a position from a 1-based line and column.
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The origin of every surface.
    #[must_use]
    pub const fn origin() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::origin()
    }
}

/// A selection span between two positions.
///
/// `anchor` is where the selection started and `head` where the caret ended
/// up; either may come first in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub anchor: Position,
    pub head: Position,
}

impl Selection {
    #[must_use]
    pub const fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    /// The earlier of the two ends.
    #[must_use]
    pub fn start(&self) -> Position {
        self.anchor.min(self.head)
    }

    /// The later of the two ends.
    #[must_use]
    pub fn end(&self) -> Position {
        self.anchor.max(self.head)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Whether the selection crosses a line boundary.
    #[must_use]
    pub fn is_multiline(&self) -> bool {
        self.anchor.line != self.head.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_orders_its_ends() {
        let sel = Selection::new(Position::new(2, 9), Position::new(2, 3));
        assert_eq!(sel.start(), Position::new(2, 3));
        assert_eq!(sel.end(), Position::new(2, 9));
        assert!(!sel.is_multiline());
    }

    #[test]
    fn positions_compare_line_first() {
        assert!(Position::new(1, 40) < Position::new(2, 1));
        assert!(Position::new(3, 2) < Position::new(3, 5));
    }

    #[test]
    fn empty_and_multiline_flags() {
        let p = Position::new(4, 4);
        assert!(Selection::new(p, p).is_empty());
        assert!(Selection::new(Position::new(1, 1), p).is_multiline());
    }
}
