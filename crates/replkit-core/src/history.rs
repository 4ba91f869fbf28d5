#![forbid(unsafe_code)]

//! Command-line history with a navigation cursor.
//!
//! # Invariants
//!
//! 1. `cursor <= len` at all times.
//! 2. No two adjacent entries are identical.
//! 3. Entries are never rewritten once appended.
//! 4. Every [`CommandHistory::add`] resets the cursor to `len` (one past the
//!    newest entry), even when the line itself was rejected.

/// Ordered, append-only log of entered command lines.
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    lines: Vec<String>,
    cursor: usize,
}

impl CommandHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `line` if it is non-empty and differs from the newest entry.
    ///
    /// Returns `true` if the line was stored.
    pub fn add(&mut self, line: &str) -> bool {
        let stored = !line.is_empty() && self.lines.last().is_none_or(|last| last != line);
        if stored {
            self.lines.push(line.to_owned());
        }
        self.cursor = self.lines.len();
        stored
    }

    /// The entry under the cursor, or `None` when the cursor is past the end.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.lines.get(self.cursor).map(String::as_str)
    }

    /// Move towards newer entries.
    ///
    /// Returns `false` and leaves the cursor unchanged when already at the
    /// newest entry (or past it).
    pub fn move_next(&mut self) -> bool {
        let next = self.cursor + 1;
        if next < self.lines.len() {
            self.cursor = next;
            true
        } else {
            false
        }
    }

    /// Move towards older entries.
    ///
    /// Returns `false` at the oldest entry.
    pub fn move_previous(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}
