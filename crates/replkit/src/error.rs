#![forbid(unsafe_code)]

//! Unified error type and degradation classification.
//!
//! Every console failure is survivable except losing one of the console's
//! threads. [`Error::degradation`] tells the host what the console already
//! did (or what it should do) so it can keep the session alive.

use std::fmt;

use replkit_runtime::{ConfigError, ConsoleError, ExecutionFault, LookupError};

// ── Unified Error ───────────────────────────────────────────────────────

/// Top-level error type for replkit hosts.
#[derive(Debug)]
pub enum Error {
    /// A console operation failed.
    Console(ConsoleError),
    /// Configuration could not be loaded or is invalid.
    Config(ConfigError),
    /// Raw I/O error (convenience variant for `?` on io::Result).
    Io(std::io::Error),
}

/// Standard result type for replkit APIs.
pub type Result<T> = std::result::Result<T, Error>;

// ── Graceful Degradation ────────────────────────────────────────────────

/// How the session continues after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationAction {
    /// Show the error in the console output and prompt again.
    ReportAndPrompt,
    /// Abandon the current statement and prompt again.
    AbandonStatement,
    /// Log and carry on; the user sees nothing.
    LogOnly,
    /// Keep running with the default configuration.
    UseDefaults,
    /// The console is gone; stop driving it.
    Shutdown,
}

impl Error {
    pub fn degradation(&self) -> DegradationAction {
        match self {
            Self::Console(ConsoleError::Compilation(_)) => DegradationAction::ReportAndPrompt,
            Self::Console(ConsoleError::Execution(ExecutionFault::Interrupted)) => {
                DegradationAction::AbandonStatement
            }
            Self::Console(ConsoleError::Execution(_)) => DegradationAction::ReportAndPrompt,
            Self::Console(ConsoleError::Interrupted) => DegradationAction::AbandonStatement,
            Self::Console(ConsoleError::CompletionLookup(_)) => DegradationAction::LogOnly,
            Self::Console(ConsoleError::Config(_)) | Self::Config(_) => {
                DegradationAction::UseDefaults
            }
            Self::Console(ConsoleError::Disposed | ConsoleError::Spawn { .. }) => {
                DegradationAction::Shutdown
            }
            Self::Io(_) => DegradationAction::Shutdown,
        }
    }

    /// Error type label for tracing fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Console(err) => err.kind(),
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }

    /// Whether the session can continue.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.degradation(), DegradationAction::Shutdown)
    }
}

// ── Display ─────────────────────────────────────────────────────────────

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "I/O: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Console(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

// ── From conversions ────────────────────────────────────────────────────

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ConsoleError> for Error {
    fn from(err: ConsoleError) -> Self {
        match err {
            ConsoleError::Config(err) => Self::Config(err),
            other => Self::Console(other),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<ExecutionFault> for Error {
    fn from(fault: ExecutionFault) -> Self {
        Self::Console(fault.into())
    }
}

impl From<LookupError> for Error {
    fn from(err: LookupError) -> Self {
        Self::Console(ConsoleError::CompletionLookup(err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use replkit_runtime::Diagnostic;

    use super::*;

    #[test]
    fn compilation_is_reported() {
        let err = Error::from(ConsoleError::Compilation(vec![Diagnostic::new(
            "invalid syntax",
            1,
        )]));
        assert_eq!(err.degradation(), DegradationAction::ReportAndPrompt);
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Syntax Error: invalid syntax (line 1)");
        assert_eq!(err.error_type(), "compilation");
    }

    #[test]
    fn interrupt_abandons_statement() {
        let err = Error::from(ExecutionFault::Interrupted);
        assert!(matches!(err, Error::Console(ConsoleError::Interrupted)));
        assert_eq!(err.degradation(), DegradationAction::AbandonStatement);
    }

    #[test]
    fn raised_fault_is_reported() {
        let err = Error::from(ExecutionFault::raised("NameError", "name 'x' is not defined"));
        assert_eq!(err.degradation(), DegradationAction::ReportAndPrompt);
        assert!(err.to_string().contains("NameError"));
    }

    #[test]
    fn lookup_failure_is_log_only() {
        let err = Error::from(LookupError::Unresolved("foo".into()));
        assert_eq!(err.degradation(), DegradationAction::LogOnly);
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn config_errors_are_unwrapped() {
        let err = Error::from(ConsoleError::Config(ConfigError::Validation(vec![
            "poll_interval_ms must be > 0".into(),
        ])));
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.degradation(), DegradationAction::UseDefaults);
        assert_eq!(err.error_type(), "config");
    }

    #[test]
    fn losing_a_thread_is_fatal() {
        let err = Error::from(ConsoleError::Spawn {
            thread: "completion",
            source: std::io::Error::other("no threads"),
        });
        assert_eq!(err.degradation(), DegradationAction::Shutdown);
        assert!(!err.is_recoverable());
        assert!(!Error::from(ConsoleError::Disposed).is_recoverable());
        assert!(!Error::from(std::io::Error::other("pipe")).is_recoverable());
    }
}
