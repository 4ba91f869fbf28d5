#![forbid(unsafe_code)]

//! The read-eval-print loop.
//!
//! [`ReplHost`] drives a [`Console`] from its own thread: write the prompt,
//! block for a line, compile it (accumulating incomplete input across
//! continuation lines), run it through the command dispatcher and report
//! failures. The loop ends when the console is disposed.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use replkit_core::Style;

use crate::console::Console;
use crate::engine::SourceKind;
use crate::error::{ConsoleError, Result};

/// Counters for one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplStats {
    pub statements: usize,
    pub errors: usize,
}

/// A REPL thread bound to a console.
pub struct ReplHost {
    console: Arc<Console>,
    thread: Option<JoinHandle<ReplStats>>,
}

impl ReplHost {
    /// Start the loop on a thread named `replkit-repl`.
    pub fn spawn(console: Arc<Console>) -> Result<Self> {
        let looped = Arc::clone(&console);
        let thread = thread::Builder::new()
            .name("replkit-repl".into())
            .spawn(move || run(&looped))
            .map_err(|source| ConsoleError::Spawn {
                thread: "repl",
                source,
            })?;
        Ok(Self {
            console,
            thread: Some(thread),
        })
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }

    /// Dispose the console and wait for the loop to finish.
    pub fn shutdown(mut self) -> ReplStats {
        self.console.dispose();
        self.thread
            .take()
            .and_then(|t| t.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for ReplHost {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.console.dispose();
            let _ = thread.join();
        }
    }
}

/// Run the loop on the calling thread until the console is disposed.
pub fn run(console: &Console) -> ReplStats {
    let config = console.config().clone();
    let mut stats = ReplStats::default();
    let mut pending = String::new();
    let mut prompted = false;
    tracing::info!(target: "replkit.host", "repl loop started");

    loop {
        let (prompt, indent) = if pending.is_empty() {
            (&config.prompt, 0)
        } else {
            (
                &config.continuation_prompt,
                console.engine().continuation_indent(&pending),
            )
        };
        if !std::mem::take(&mut prompted) {
            console.write(prompt, Style::Prompt);
        }
        let Some(line) = console.read_line(indent) else {
            break;
        };

        let source = if pending.is_empty() {
            line
        } else {
            format!("{pending}\n{line}")
        };
        let _span = tracing::debug_span!(target: "replkit.host", "statement", len = source.len())
            .entered();
        match console.compile(&source, SourceKind::Interactive) {
            Ok(None) => {
                tracing::trace!(target: "replkit.host", "incomplete input");
                pending = source;
                continue;
            }
            Ok(Some(unit)) => {
                pending.clear();
                stats.statements += 1;
                if console.execute_and_prompt(unit, &config.prompt).is_err() {
                    stats.errors += 1;
                }
                prompted = true;
            }
            Err(err) => {
                pending.clear();
                stats.errors += 1;
                console.report(&err);
            }
        }
    }

    tracing::info!(
        target: "replkit.host",
        statements = stats.statements,
        errors = stats.errors,
        "repl loop finished"
    );
    stats
}
