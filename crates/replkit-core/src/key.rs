#![forbid(unsafe_code)]

//! Keystrokes the console reacts to.

/// A keystroke delivered by the host on the surface thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character, including `\t` typed as text.
    Char(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    Home,
    Up,
    Down,
    Escape,
    /// Ctrl+Space: explicit completion request.
    CtrlSpace,
    /// Ctrl+C with no selection: keyboard interrupt.
    Interrupt,
}

impl Key {
    /// Characters that keep a completion window open while typing.
    ///
    /// Anything else, `_` included, commits the selected item first.
    #[must_use]
    pub fn keeps_completion_open(c: char) -> bool {
        c.is_alphanumeric()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits_keep_window_open() {
        assert!(Key::keeps_completion_open('a'));
        assert!(Key::keeps_completion_open('Z'));
        assert!(Key::keeps_completion_open('7'));
        assert!(Key::keeps_completion_open('é'));
    }

    #[test]
    fn underscore_and_punctuation_commit() {
        for c in ['_', '(', '.', ' ', '\t', ','] {
            assert!(!Key::keeps_completion_open(c), "{c:?}");
        }
    }
}
