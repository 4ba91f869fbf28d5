#![forbid(unsafe_code)]

//! Console configuration.
//!
//! Every tunable of the console lives in [`ConsoleConfig`]. With the
//! `config-file` feature the struct can be loaded from TOML or JSON:
//!
//! ```toml
//! # replkit.toml
//! prompt = ">>> "
//! poll_interval_ms = 250
//! description_delay_ms = 300
//! full_autocompletion = false
//! ```
//!
//! ```rust,ignore
//! let config = ConsoleConfig::from_toml_file("replkit.toml")?;
//! ```
//!
//! Missing keys fall back to [`ConsoleConfig::default`].

#[cfg(feature = "config-file")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config-file")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables for a console instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct ConsoleConfig {
    /// Primary prompt.
    pub prompt: String,
    /// Prompt for continuation lines of an incomplete statement.
    pub continuation_prompt: String,
    /// Bounded wait increment of the command dispatcher.
    pub poll_interval_ms: u64,
    /// Debounce delay before a completion description is resolved.
    pub description_delay_ms: u64,
    /// Typing `.` opens the completion list.
    pub full_autocompletion: bool,
    /// Ctrl+Space opens the completion list.
    pub ctrl_space_autocompletion: bool,
    /// Skip completion for expressions that look like calls.
    pub exclude_callables: bool,
    /// Prefix shown before each line of a multi-line paste.
    pub paste_continuation_prefix: String,
    /// Spaces substituted for a tab in pasted statements.
    pub paste_tab_width: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prompt: ">>> ".into(),
            continuation_prompt: "... ".into(),
            poll_interval_ms: 1000,
            description_delay_ms: 300,
            full_autocompletion: true,
            ctrl_space_autocompletion: true,
            exclude_callables: true,
            paste_continuation_prefix: "... ".into(),
            paste_tab_width: 3,
        }
    }
}

impl ConsoleConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn description_delay(&self) -> Duration {
        Duration::from_millis(self.description_delay_ms)
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_description_delay(mut self, delay: Duration) -> Self {
        self.description_delay_ms = delay.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Returns every out-of-range parameter; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be > 0".into());
        }
        if self.description_delay_ms == 0 {
            errors.push("description_delay_ms must be > 0".into());
        }
        if self.prompt.contains('\n') {
            errors.push("prompt must be a single line".into());
        }
        if self.continuation_prompt.contains('\n') {
            errors.push("continuation_prompt must be a single line".into());
        }
        errors
    }

    /// Validate and convert the list into a [`ConfigError`].
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(s)?.validated()
    }

    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    #[cfg(feature = "config-file")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(s)?.validated()
    }

    #[cfg(feature = "config-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }
}

/// Errors that can occur when loading a console configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "config-file")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[cfg(feature = "config-file")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ConsoleConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.description_delay(), Duration::from_millis(300));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = ConsoleConfig {
            poll_interval_ms: 0,
            description_delay_ms: 0,
            ..ConsoleConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            config.validated(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn multiline_prompt_is_rejected() {
        let config = ConsoleConfig::default().with_prompt(">>>\n");
        assert_eq!(config.validate(), ["prompt must be a single line"]);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ConsoleConfig::from_toml_str("poll_interval_ms = 50\nfull_autocompletion = false\n").unwrap();
        assert_eq!(config.poll_interval_ms, 50);
        assert!(!config.full_autocompletion);
        assert_eq!(config.prompt, ">>> ");
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_file_loads() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prompt = \"$ \"\ndescription_delay_ms = 150").unwrap();
        let config = ConsoleConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.description_delay(), Duration::from_millis(150));
    }

    #[test]
    #[cfg(feature = "config-file")]
    fn missing_file_is_io_error() {
        let err = ConsoleConfig::from_toml_file("/nonexistent/replkit.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn json_validation_errors_surface() {
        let err = ConsoleConfig::from_json_str(r#"{"description_delay_ms": 0}"#).unwrap_err();
        assert!(err.to_string().contains("description_delay_ms"));
    }
}
