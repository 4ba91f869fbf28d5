#![forbid(unsafe_code)]

//! Read-only region policy.
//!
//! Only the last line of the surface is editable, and only to the right of
//! the prompt. [`EditContext`] captures the caret state needed to answer
//! "may this keystroke mutate the surface?" without touching the surface.
//!
//! ```text
//!  line 1  >>> 1 + 1            read-only (history)
//!  line 2  2                    read-only (output)
//!  line 3  >>> foo.ba|          prompt (cols 1..=4) read-only, cols 5.. editable
//! ```
//!
//! # Invariants
//!
//! 1. Any caret line before the last line is read-only regardless of column.
//! 2. On the last line, columns `1..=prompt_len` are read-only.
//! 3. A selection is deletable only if it is single-line, on the last line,
//!    and both of its ends sit at or after column `prompt_len + 1`.
//! 4. Backspace needs at least one editable character to the left of the
//!    caret, so an empty input line permits insertion but not backspace.

use crate::geometry::{Position, Selection};
use crate::surface::TextSurface;

/// Snapshot of the surface state the region policy decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditContext {
    /// Caret position (1-based).
    pub caret: Position,
    /// Total number of lines on the surface.
    pub line_count: usize,
    /// Length of the prompt on the input line, in characters.
    pub prompt_len: usize,
    /// Active selection, if any.
    pub selection: Option<Selection>,
}

impl EditContext {
    #[must_use]
    pub const fn new(caret: Position, line_count: usize, prompt_len: usize) -> Self {
        Self {
            caret,
            line_count,
            prompt_len,
            selection: None,
        }
    }

    #[must_use]
    pub const fn with_selection(mut self, selection: Option<Selection>) -> Self {
        self.selection = selection;
        self
    }

    /// Capture the current state of a surface.
    #[must_use]
    pub fn from_surface(surface: &dyn TextSurface, prompt_len: usize) -> Self {
        Self {
            caret: surface.caret(),
            line_count: surface.line_count(),
            prompt_len,
            selection: surface.selection(),
        }
    }

    /// The caret is on a line before the last one.
    #[must_use]
    pub fn is_current_line_read_only(&self) -> bool {
        self.caret.line < self.line_count
    }

    /// The caret sits inside (or directly on) the prompt.
    #[must_use]
    pub fn is_in_prompt(&self) -> bool {
        self.caret.column < self.prompt_len + 1
    }

    #[must_use]
    pub fn is_in_read_only_region(&self) -> bool {
        self.is_current_line_read_only() || self.is_in_prompt()
    }

    /// Whether typed or pasted text may be inserted at the caret.
    #[must_use]
    pub fn can_insert(&self) -> bool {
        !self.is_in_read_only_region()
    }

    /// Whether the forward-delete key may act.
    #[must_use]
    pub fn can_delete(&self) -> bool {
        match self.active_selection() {
            Some(sel) => self.selection_is_deletable(&sel),
            None => !self.is_in_read_only_region(),
        }
    }

    /// Whether the backspace key may act.
    #[must_use]
    pub fn can_backspace(&self) -> bool {
        match self.active_selection() {
            Some(sel) => self.selection_is_deletable(&sel),
            None => !self.is_current_line_read_only() && self.caret.column >= self.prompt_len + 2,
        }
    }

    /// Whether Up/Down may recall history entries.
    #[must_use]
    pub fn can_navigate_history(&self) -> bool {
        !self.is_in_read_only_region()
    }

    #[must_use]
    pub fn selection_is_deletable(&self, selection: &Selection) -> bool {
        let boundary = self.prompt_len + 1;
        !selection.is_multiline()
            && selection.start().line == self.line_count
            && !self.is_current_line_read_only()
            && selection.start().column >= boundary
            && selection.end().column >= boundary
    }

    /// The first editable position: last line, just after the prompt.
    #[must_use]
    pub fn home_position(&self) -> Position {
        home_position(self.line_count, self.prompt_len)
    }

    fn active_selection(&self) -> Option<Selection> {
        self.selection.filter(|sel| !sel.is_empty())
    }
}

/// The first editable position for a surface with `line_count` lines.
#[must_use]
pub fn home_position(line_count: usize, prompt_len: usize) -> Position {
    Position::new(line_count.max(1), prompt_len + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(line: usize, column: usize) -> EditContext {
        EditContext::new(Position::new(line, column), 3, 4)
    }

    #[test]
    fn prompt_columns_are_read_only() {
        for column in 1..=4 {
            assert!(ctx(3, column).is_in_read_only_region(), "column {column}");
            assert!(!ctx(3, column).can_insert());
        }
    }

    #[test]
    fn columns_after_prompt_are_editable() {
        for column in 5..12 {
            assert!(!ctx(3, column).is_in_read_only_region(), "column {column}");
            assert!(ctx(3, column).can_insert());
        }
    }

    #[test]
    fn earlier_lines_are_read_only_at_any_column() {
        for line in 1..3 {
            for column in [1, 4, 5, 40] {
                let c = ctx(line, column);
                assert!(c.is_in_read_only_region());
                assert!(!c.can_delete());
                assert!(!c.can_backspace());
            }
        }
    }

    #[test]
    fn empty_input_allows_insert_but_not_backspace() {
        let c = ctx(3, 5);
        assert!(c.can_insert());
        assert!(!c.can_backspace());
        assert!(c.can_delete());
        assert!(ctx(3, 6).can_backspace());
    }

    #[test]
    fn selection_inside_input_is_deletable() {
        let sel = Selection::new(Position::new(3, 5), Position::new(3, 9));
        let c = ctx(3, 9).with_selection(Some(sel));
        assert!(c.can_delete());
        assert!(c.can_backspace());
    }

    #[test]
    fn selection_reaching_into_prompt_is_not_deletable() {
        let sel = Selection::new(Position::new(3, 2), Position::new(3, 9));
        let c = ctx(3, 9).with_selection(Some(sel));
        assert!(!c.can_delete());
        assert!(!c.can_backspace());
    }

    #[test]
    fn multiline_selection_is_not_deletable() {
        let sel = Selection::new(Position::new(2, 6), Position::new(3, 7));
        let c = ctx(3, 7).with_selection(Some(sel));
        assert!(!c.can_delete());
    }

    #[test]
    fn empty_selection_falls_back_to_caret_rules() {
        let p = Position::new(3, 5);
        let c = ctx(3, 5).with_selection(Some(Selection::new(p, p)));
        assert!(!c.can_backspace());
        assert!(c.can_delete());
    }

    #[test]
    fn home_position_is_after_prompt_on_last_line() {
        assert_eq!(ctx(1, 1).home_position(), Position::new(3, 5));
        assert_eq!(home_position(0, 4), Position::new(1, 5));
    }
}
