#![forbid(unsafe_code)]

/// Classification of text written to the console.
///
/// Only [`Style::Prompt`] changes console state: it establishes the prompt
/// length, i.e. the read-only boundary of the input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Style {
    Prompt,
    #[default]
    Output,
    Error,
    Warning,
}

impl Style {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Output => "output",
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}
