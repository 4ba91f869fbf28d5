#![forbid(unsafe_code)]

//! Completion candidates and the state of an open completion window.

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    /// Member name inserted on commit.
    pub text: String,
    /// Object path the member belongs to; empty for globals.
    pub stub: String,
    /// The member is reached through an instance, so its description is
    /// looked up on the owner's type.
    pub is_instance: bool,
    /// Resolved lazily after the debounce delay.
    pub description: Option<String>,
}

impl CompletionItem {
    pub fn new(text: impl Into<String>, stub: impl Into<String>, is_instance: bool) -> Self {
        Self {
            text: text.into(),
            stub: stub.into(),
            is_instance,
            description: None,
        }
    }
}

/// The completion list shown next to the caret.
///
/// `start_column` is the 1-based column on the input line where the member
/// prefix begins; committing an item replaces `[start_column, caret)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionWindow {
    items: Vec<CompletionItem>,
    member_prefix: String,
    line: usize,
    start_column: usize,
    selected: Option<usize>,
}

impl CompletionWindow {
    pub fn new(
        items: Vec<CompletionItem>,
        member_prefix: impl Into<String>,
        line: usize,
        start_column: usize,
    ) -> Self {
        let mut window = Self {
            items,
            member_prefix: String::new(),
            line,
            start_column,
            selected: None,
        };
        window.select_matching(&member_prefix.into());
        window
    }

    pub fn items(&self) -> &[CompletionItem] {
        &self.items
    }

    pub fn labels(&self) -> Vec<String> {
        self.items.iter().map(|item| item.text.clone()).collect()
    }

    pub fn member_prefix(&self) -> &str {
        &self.member_prefix
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn start_column(&self) -> usize {
        self.start_column
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected(&self) -> Option<&CompletionItem> {
        self.selected.and_then(|idx| self.items.get(idx))
    }

    /// Select the first item starting with `prefix`, ignoring case.
    ///
    /// An empty prefix selects the first item. Without a match the
    /// selection is kept so the list stays usable while typing.
    pub fn select_matching(&mut self, prefix: &str) -> Option<usize> {
        self.member_prefix = prefix.to_owned();
        let needle = prefix.to_lowercase();
        let found = self
            .items
            .iter()
            .position(|item| item.text.to_lowercase().starts_with(&needle));
        if found.is_some() {
            self.selected = found;
        } else if self.selected.is_none() && !self.items.is_empty() {
            self.selected = Some(0);
        }
        self.selected
    }

    /// Move the highlight by `delta`, clamped to the list bounds.
    pub fn move_selection(&mut self, delta: isize) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        let current = self.selected.unwrap_or(0);
        let next = current.saturating_add_signed(delta).min(last);
        self.selected = Some(next);
        self.selected
    }

    /// Record a resolved description on the item named `text`.
    ///
    /// Returns `false` if no item has that name.
    pub fn set_description(&mut self, text: &str, description: Option<String>) -> bool {
        match self.items.iter_mut().find(|item| item.text == text) {
            Some(item) => {
                item.description = description;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(prefix: &str) -> CompletionWindow {
        let items = ["append", "Count", "clear", "extend"]
            .into_iter()
            .map(|name| CompletionItem::new(name, "xs", true))
            .collect();
        CompletionWindow::new(items, prefix, 1, 8)
    }

    #[test]
    fn empty_prefix_selects_first() {
        let w = window("");
        assert_eq!(w.selected_index(), Some(0));
        assert_eq!(w.labels().len(), 4);
    }

    #[test]
    fn prefix_match_ignores_case() {
        let mut w = window("co");
        assert_eq!(w.selected().map(|i| i.text.as_str()), Some("Count"));
        assert_eq!(w.select_matching("CL"), Some(2));
        assert_eq!(w.member_prefix(), "CL");
    }

    #[test]
    fn unmatched_prefix_keeps_selection() {
        let mut w = window("ex");
        assert_eq!(w.select_matching("exz"), Some(3));
    }

    #[test]
    fn move_selection_clamps() {
        let mut w = window("");
        assert_eq!(w.move_selection(-1), Some(0));
        assert_eq!(w.move_selection(10), Some(3));
        assert_eq!(w.move_selection(-2), Some(1));
    }

    #[test]
    fn description_is_attached_by_name() {
        let mut w = window("");
        assert!(w.set_description("clear", Some("Remove all items.".into())));
        assert!(!w.set_description("missing", None));
        assert_eq!(
            w.items()[2].description.as_deref(),
            Some("Remove all items.")
        );
    }
}
