#![forbid(unsafe_code)]

//! Console error taxonomy.
//!
//! Compilation and execution failures are always reported to the console
//! output; completion lookup failures never are. None of these is fatal: the
//! console stays usable after every variant.

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::{Diagnostic, ExecutionFault, LookupError};

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("{}", format_diagnostics(.0))]
    Compilation(Vec<Diagnostic>),
    #[error("Exception : {0}")]
    Execution(ExecutionFault),
    #[error("KeyboardInterrupt")]
    Interrupted,
    #[error("completion lookup failed: {0}")]
    CompletionLookup(#[from] LookupError),
    #[error("console has been disposed")]
    Disposed,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to start {thread} thread: {source}")]
    Spawn {
        thread: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    /// Whether the error is shown in the console output.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            Self::Compilation(_) | Self::Execution(_) | Self::Interrupted
        )
    }

    /// Label for tracing fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Compilation(_) => "compilation",
            Self::Execution(_) => "execution",
            Self::Interrupted => "interrupted",
            Self::CompletionLookup(_) => "completion_lookup",
            Self::Disposed => "disposed",
            Self::Config(_) => "config",
            Self::Spawn { .. } => "spawn",
        }
    }
}

impl From<ExecutionFault> for ConsoleError {
    fn from(fault: ExecutionFault) -> Self {
        match fault {
            ExecutionFault::Interrupted => Self::Interrupted,
            other => Self::Execution(other),
        }
    }
}

/// One `Syntax Error:` line per diagnostic.
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("Syntax Error: {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_error_has_one_line_per_diagnostic() {
        let err = ConsoleError::Compilation(vec![
            Diagnostic::new("unexpected token ':'", 1),
            Diagnostic::new("unexpected EOF", 2),
        ]);
        assert_eq!(
            err.to_string(),
            "Syntax Error: unexpected token ':' (line 1)\nSyntax Error: unexpected EOF (line 2)"
        );
        assert!(err.is_reported());
    }

    #[test]
    fn interrupted_fault_maps_to_interrupted() {
        let err: ConsoleError = ExecutionFault::Interrupted.into();
        assert!(matches!(err, ConsoleError::Interrupted));
        assert_eq!(err.to_string(), "KeyboardInterrupt");
    }

    #[test]
    fn lookup_failures_are_not_reported() {
        let err: ConsoleError = LookupError::Unresolved("foo".into()).into();
        assert!(!err.is_reported());
        assert_eq!(err.kind(), "completion_lookup");
    }
}
