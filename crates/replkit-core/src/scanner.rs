#![forbid(unsafe_code)]

//! Delimiter scanning for member completion.
//!
//! Given the text of the input line up to the caret, the scanner finds the
//! expression being completed: everything after the rightmost *top-level*
//! delimiter. That expression is then split into an object path and the
//! partial member name typed so far.
//!
//! ```text
//! >>> x = foo(a, b).ba|
//!       ^ last top-level delimiter (space)
//!         object path = "foo(a, b)"   member prefix = "ba"
//! ```
//!
//! Parenthesis and bracket groups are skipped as a unit; an *unbalanced*
//! opener counts as a delimiter. Quoted spans are opaque. String detection is
//! rudimentary: escaped quotes and triple quotes are not understood.
//!
//! Parentheses and brackets are balanced independently, so interleaved
//! groups such as `( [ ) ]` are not recognised as malformed.

use std::sync::OnceLock;

use regex_lite::Regex;

/// Characters that end an expression at top level.
pub const DELIMITERS: &[char] = &[
    ',', '\t', ' ', ':', ';', '+', '-', '=', '*', '/', '&', '|', '^', '%', '~', '<', '>',
];

/// Result of splitting the caret text into completion parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionPrefix {
    /// The whole expression after the last top-level delimiter.
    pub name: String,
    /// Object path whose members are listed; empty for the global scope.
    pub object_path: String,
    /// Partial member name already typed.
    pub member_prefix: String,
}

impl CompletionPrefix {
    /// Crude call detection: the expression contains a closing parenthesis.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        self.name.contains(')')
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.object_path.is_empty()
    }
}

#[derive(Debug, Default)]
struct QuoteState {
    double: bool,
    single: bool,
}

impl QuoteState {
    /// Feed one character; returns `true` if it is outside any string and is
    /// not itself a quote.
    fn feed(&mut self, c: char) -> bool {
        match c {
            '"' if !self.single => {
                self.double = !self.double;
                false
            }
            '\'' if !self.double => {
                self.single = !self.single;
                false
            }
            _ => !self.double && !self.single,
        }
    }
}

/// Index of the last unbalanced `open`/`close` character in `text`.
///
/// An opener that is never closed wins (the innermost one). Otherwise the
/// last stray closer is reported. Returns `None` when everything balances.
#[must_use]
pub fn find_last_unbalanced(text: &[char], open: char, close: char) -> Option<usize> {
    let mut last = None;
    let mut quotes = QuoteState::default();
    let mut openers = Vec::new();

    for (i, &c) in text.iter().enumerate() {
        if !quotes.feed(c) {
            continue;
        }
        if c == open {
            openers.push(i);
        } else if c == close && openers.pop().is_none() {
            last = Some(i);
        }
    }

    openers.pop().or(last)
}

/// Char index of the rightmost top-level delimiter in `text`.
#[must_use]
pub fn find_last_delimiter(text: &[char]) -> Option<usize> {
    let paren = find_last_unbalanced(text, '(', ')');
    let bracket = find_last_unbalanced(text, '[', ']');
    let mut last = paren.max(bracket);

    let mut quotes = QuoteState::default();
    let mut i = last.map_or(0, |idx| idx + 1);
    while i < text.len() {
        let c = text[i];
        if quotes.feed(c) {
            match c {
                '(' => i = skip_group(text, i, '(', ')'),
                '[' => i = skip_group(text, i, '[', ']'),
                c if DELIMITERS.contains(&c) => last = Some(i),
                _ => {}
            }
        }
        i += 1;
    }

    last
}

/// Jump from an opener at `at` to the closer that balances it.
fn skip_group(text: &[char], at: usize, open: char, close: char) -> usize {
    match find_last_unbalanced(&text[at + 1..], open, close) {
        Some(closer) => at + 1 + closer,
        None => at,
    }
}

fn last_word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+$").expect("static pattern"))
}

/// Trailing identifier characters of `text` (may be empty).
#[must_use]
pub fn last_word(text: &str) -> &str {
    last_word_regex().find(text).map_or("", |m| m.as_str())
}

/// Split the caret text into the expression, object path and member prefix.
#[must_use]
pub fn split_completion_prefix(line: &str) -> CompletionPrefix {
    let chars: Vec<char> = line.chars().collect();
    let start = find_last_delimiter(&chars).map_or(0, |idx| idx + 1);
    let name: String = chars[start..].iter().collect();

    let member = last_word(&name);
    let before = &name[..name.len() - member.len()];
    let object_path = before.strip_suffix('.').unwrap_or_default();

    CompletionPrefix {
        object_path: object_path.to_owned(),
        member_prefix: member.to_owned(),
        name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn call_result_member() {
        let p = split_completion_prefix("foo(a, b).bar");
        assert_eq!(p.object_path, "foo(a, b)");
        assert_eq!(p.member_prefix, "bar");
        assert!(p.is_callable());
    }

    #[test]
    fn comma_inside_quotes_is_not_a_delimiter() {
        let p = split_completion_prefix("\"a,b\".len");
        assert_eq!(p.object_path, "\"a,b\"");
        assert_eq!(p.member_prefix, "len");
    }

    #[test]
    fn single_quotes_are_opaque_too() {
        let p = split_completion_prefix("x = 'a b'.up");
        assert_eq!(p.object_path, "'a b'");
        assert_eq!(p.member_prefix, "up");
    }

    #[test]
    fn assignment_splits_at_space() {
        let p = split_completion_prefix(">>> x = doc.Title");
        assert_eq!(p.name, "doc.Title");
        assert_eq!(p.object_path, "doc");
        assert_eq!(p.member_prefix, "Title");
    }

    #[test]
    fn trailing_dot_has_empty_member() {
        let p = split_completion_prefix("a.b.");
        assert_eq!(p.object_path, "a.b");
        assert_eq!(p.member_prefix, "");
    }

    #[test]
    fn bare_word_is_global() {
        let p = split_completion_prefix("pri");
        assert!(p.is_global());
        assert_eq!(p.member_prefix, "pri");
    }

    #[test]
    fn unbalanced_paren_acts_as_delimiter() {
        let p = split_completion_prefix("print(obj.na");
        assert_eq!(p.object_path, "obj");
        assert_eq!(p.member_prefix, "na");
        assert_eq!(find_last_delimiter(&chars("print(obj.na")), Some(5));
    }

    #[test]
    fn unbalanced_bracket_acts_as_delimiter() {
        let p = split_completion_prefix("xs[item.ke");
        assert_eq!(p.object_path, "item");
        assert_eq!(p.member_prefix, "ke");
    }

    #[test]
    fn nested_groups_are_skipped() {
        let text = chars("f(g(1, 2), [3, 4]).x");
        assert_eq!(find_last_delimiter(&text), None);
    }

    #[test]
    fn last_unbalanced_prefers_open_group() {
        assert_eq!(find_last_unbalanced(&chars("a(b(c)"), '(', ')'), Some(1));
        assert_eq!(find_last_unbalanced(&chars("a)b"), '(', ')'), Some(1));
        assert_eq!(find_last_unbalanced(&chars("(a)"), '(', ')'), None);
        assert_eq!(find_last_unbalanced(&chars("'('"), '(', ')'), None);
    }

    #[test]
    fn last_word_matches_trailing_identifier() {
        assert_eq!(last_word("foo.bar_1"), "bar_1");
        assert_eq!(last_word("foo."), "");
        assert_eq!(last_word(""), "");
    }
}
