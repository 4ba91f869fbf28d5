#![forbid(unsafe_code)]

//! The editable text surface.
//!
//! [`TextSurface`] is the seam between the console core and whatever widget
//! displays the text. The core only ever mutates a surface from the surface
//! thread; implementations therefore need `Send` but not `Sync`.
//!
//! A surface implements a handful of primitives (line access, caret,
//! selection, range replacement); editing helpers such as
//! [`TextSurface::insert_text`] and [`TextSurface::backspace`] are provided on
//! top of them. The completion hooks default to no-ops so plain surfaces can
//! ignore completion popups entirely.

use ropey::Rope;

use crate::geometry::{Position, Selection};

/// An editable, line-oriented text area.
pub trait TextSurface: Send {
    /// Number of lines; an empty surface has one (empty) line.
    fn line_count(&self) -> usize;

    /// Text of a 1-based line without its line terminator.
    ///
    /// Out-of-range lines read as empty.
    fn line_text(&self, line: usize) -> String;

    fn caret(&self) -> Position;

    /// Move the caret; implementations clamp to the document.
    fn set_caret(&mut self, position: Position);

    fn selection(&self) -> Option<Selection>;

    fn set_selection(&mut self, selection: Option<Selection>);

    /// Replace `[start, end)` with `text`, leaving the caret after the
    /// inserted text and clearing any selection.
    fn replace(&mut self, start: Position, end: Position, text: &str);

    /// Length of a line in characters.
    fn line_len(&self, line: usize) -> usize {
        self.line_text(line).chars().count()
    }

    fn last_line_text(&self) -> String {
        self.line_text(self.line_count())
    }

    /// Position just after the last character of the document.
    fn end_position(&self) -> Position {
        let last = self.line_count().max(1);
        Position::new(last, self.line_len(last) + 1)
    }

    fn move_to_end(&mut self) {
        let end = self.end_position();
        if self.caret() != end {
            self.set_caret(end);
        }
    }

    /// Type `text` at the caret, replacing the selection if there is one.
    fn insert_text(&mut self, text: &str) {
        match self.selection().filter(|sel| !sel.is_empty()) {
            Some(sel) => self.replace(sel.start(), sel.end(), text),
            None => {
                let caret = self.caret();
                self.replace(caret, caret, text);
            }
        }
    }

    /// Delete the selection, or the character before the caret.
    fn backspace(&mut self) {
        if let Some(sel) = self.selection().filter(|sel| !sel.is_empty()) {
            self.replace(sel.start(), sel.end(), "");
            return;
        }
        let caret = self.caret();
        let start = if caret.column > 1 {
            Position::new(caret.line, caret.column - 1)
        } else if caret.line > 1 {
            Position::new(caret.line - 1, self.line_len(caret.line - 1) + 1)
        } else {
            return;
        };
        self.replace(start, caret, "");
    }

    /// Delete the selection, or the character after the caret.
    fn delete_forward(&mut self) {
        if let Some(sel) = self.selection().filter(|sel| !sel.is_empty()) {
            self.replace(sel.start(), sel.end(), "");
            return;
        }
        let caret = self.caret();
        let end = if caret.column <= self.line_len(caret.line) {
            Position::new(caret.line, caret.column + 1)
        } else if caret.line < self.line_count() {
            Position::new(caret.line + 1, 1)
        } else {
            return;
        };
        self.replace(caret, end, "");
        self.set_caret(caret);
    }

    /// Text of the caret line up to (not including) the caret.
    fn text_before_caret(&self) -> String {
        let caret = self.caret();
        self.line_text(caret.line)
            .chars()
            .take(caret.column.saturating_sub(1))
            .collect()
    }

    /// Whole document, lines joined with `\n`.
    fn text(&self) -> String {
        (1..=self.line_count())
            .map(|line| self.line_text(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// A completion list should be displayed.
    fn show_completions(&mut self, _items: &[String], _selected: Option<usize>) {}

    /// The highlighted completion changed.
    fn select_completion(&mut self, _index: Option<usize>) {}

    fn close_completions(&mut self) {}

    /// Show (or hide, with `None`) the description of the highlighted item.
    fn show_description(&mut self, _description: Option<&str>) {}
}

/// Popup state recorded by [`MemorySurface`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopupState {
    pub items: Vec<String>,
    pub selected: Option<usize>,
    pub description: Option<String>,
}

/// A rope-backed surface with no rendering, used by headless hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    rope: Rope,
    caret: Position,
    selection: Option<Selection>,
    popup: Option<PopupState>,
    popups_opened: usize,
}

impl MemorySurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface holding `text` with the caret at the end.
    #[must_use]
    pub fn with_text(text: &str) -> Self {
        let mut surface = Self {
            rope: Rope::from_str(text),
            ..Self::default()
        };
        surface.move_to_end();
        surface
    }

    /// The completion popup, if one is open.
    #[must_use]
    pub fn popup(&self) -> Option<&PopupState> {
        self.popup.as_ref()
    }

    /// How many completion popups were opened over the surface lifetime.
    #[must_use]
    pub fn popups_opened(&self) -> usize {
        self.popups_opened
    }

    fn clamp(&self, position: Position) -> Position {
        let line = position.line.clamp(1, self.line_count());
        let column = position.column.clamp(1, self.line_len(line) + 1);
        Position::new(line, column)
    }

    fn char_index(&self, position: Position) -> usize {
        let position = self.clamp(position);
        self.rope.line_to_char(position.line - 1) + position.column - 1
    }

    fn position_of(&self, char_idx: usize) -> Position {
        let line = self.rope.char_to_line(char_idx);
        Position::new(line + 1, char_idx - self.rope.line_to_char(line) + 1)
    }
}

impl TextSurface for MemorySurface {
    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line_text(&self, line: usize) -> String {
        if line == 0 || line > self.rope.len_lines() {
            return String::new();
        }
        let mut text = self.rope.line(line - 1).to_string();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        text
    }

    fn caret(&self) -> Position {
        self.caret
    }

    fn set_caret(&mut self, position: Position) {
        self.caret = self.clamp(position);
    }

    fn selection(&self) -> Option<Selection> {
        self.selection
    }

    fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection.map(|sel| Selection::new(self.clamp(sel.anchor), self.clamp(sel.head)));
        if let Some(sel) = self.selection {
            self.caret = sel.head;
        }
    }

    fn replace(&mut self, start: Position, end: Position, text: &str) {
        let (from, to) = {
            let a = self.char_index(start);
            let b = self.char_index(end);
            (a.min(b), a.max(b))
        };
        if to > from {
            self.rope.remove(from..to);
        }
        self.rope.insert(from, text);
        self.selection = None;
        self.caret = self.position_of(from + text.chars().count());
    }

    fn show_completions(&mut self, items: &[String], selected: Option<usize>) {
        self.popups_opened += 1;
        self.popup = Some(PopupState {
            items: items.to_vec(),
            selected,
            description: None,
        });
    }

    fn select_completion(&mut self, index: Option<usize>) {
        if let Some(popup) = self.popup.as_mut() {
            popup.selected = index;
            popup.description = None;
        }
    }

    fn close_completions(&mut self) {
        self.popup = None;
    }

    fn show_description(&mut self, description: Option<&str>) {
        if let Some(popup) = self.popup.as_mut() {
            popup.description = description.map(str::to_owned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_surface_has_one_line() {
        let surface = MemorySurface::new();
        assert_eq!(surface.line_count(), 1);
        assert_eq!(surface.last_line_text(), "");
        assert_eq!(surface.caret(), Position::origin());
    }

    #[test]
    fn insert_moves_caret_past_text() {
        let mut surface = MemorySurface::new();
        surface.insert_text(">>> ");
        assert_eq!(surface.caret(), Position::new(1, 5));
        surface.insert_text("1+1\n2\n>>> ");
        assert_eq!(surface.line_count(), 3);
        assert_eq!(surface.line_text(2), "2");
        assert_eq!(surface.caret(), Position::new(3, 5));
    }

    #[test]
    fn replace_selection_on_insert() {
        let mut surface = MemorySurface::with_text(">>> hello");
        surface.set_selection(Some(Selection::new(Position::new(1, 5), Position::new(1, 10))));
        surface.insert_text("bye");
        assert_eq!(surface.text(), ">>> bye");
        assert_eq!(surface.selection(), None);
    }

    #[test]
    fn backspace_and_delete() {
        let mut surface = MemorySurface::with_text(">>> abc");
        surface.backspace();
        assert_eq!(surface.text(), ">>> ab");
        surface.set_caret(Position::new(1, 5));
        surface.delete_forward();
        assert_eq!(surface.text(), ">>> b");
        assert_eq!(surface.caret(), Position::new(1, 5));
    }

    #[test]
    fn caret_is_clamped() {
        let mut surface = MemorySurface::with_text("ab\ncd");
        surface.set_caret(Position::new(9, 9));
        assert_eq!(surface.caret(), Position::new(2, 3));
    }

    #[test]
    fn text_before_caret_stops_at_caret() {
        let mut surface = MemorySurface::with_text(">>> foo.bar");
        surface.set_caret(Position::new(1, 9));
        assert_eq!(surface.text_before_caret(), ">>> foo.");
    }

    #[test]
    fn popup_hooks_are_recorded() {
        let mut surface = MemorySurface::new();
        surface.show_completions(&["a".into(), "b".into()], Some(0));
        surface.show_description(Some("doc"));
        assert_eq!(surface.popup().unwrap().description.as_deref(), Some("doc"));
        surface.select_completion(Some(1));
        assert_eq!(surface.popup().unwrap().description, None);
        surface.close_completions();
        assert!(surface.popup().is_none());
        assert_eq!(surface.popups_opened(), 1);
    }
}
