#![forbid(unsafe_code)]

//! Line-mode demo console over stdin/stdout.
//!
//! Runs [`CalcEngine`] behind a full console: surface thread, REPL loop,
//! execution worker and completion pipeline. Each stdin line is typed into
//! the surface key by key and submitted with Enter; everything the console
//! appends to the surface is echoed to stdout.
//!
//! # Running
//!
//! ```sh
//! cargo run -p replkit-harness --bin replkit-demo
//! RUST_LOG=replkit=debug cargo run -p replkit-harness --bin replkit-demo -- --config console.toml
//! ```
//!
//! # Commands
//!
//! - `!interrupt`: keyboard interrupt of the running statement
//! - `!paste a;b;c`: paste `a`, `b` and `c` as a multi-line block
//! - EOF (Ctrl+D): dispose the console and exit

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use replkit_core::{Key, MemorySurface, Position, Selection, TextSurface};
use replkit_harness::CalcEngine;
use replkit_runtime::{
    ConfigError, Console, ConsoleConfig, ConsoleContext, ReplHost, ReplStats, SurfaceThread,
};
use tracing_subscriber::EnvFilter;

/// Memory surface that prints appended text unless muted.
struct EchoSurface {
    inner: MemorySurface,
    muted: Arc<AtomicBool>,
}

impl TextSurface for EchoSurface {
    fn line_count(&self) -> usize {
        self.inner.line_count()
    }

    fn line_text(&self, line: usize) -> String {
        self.inner.line_text(line)
    }

    fn caret(&self) -> Position {
        self.inner.caret()
    }

    fn set_caret(&mut self, position: Position) {
        self.inner.set_caret(position);
    }

    fn selection(&self) -> Option<Selection> {
        self.inner.selection()
    }

    fn set_selection(&mut self, selection: Option<Selection>) {
        self.inner.set_selection(selection);
    }

    fn replace(&mut self, start: Position, end: Position, text: &str) {
        let append = start == end && end == self.inner.end_position();
        self.inner.replace(start, end, text);
        if append && !self.muted.load(Ordering::Relaxed) {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "replkit-demo",
    about = "Line-mode replkit console over stdin/stdout",
    version
)]
struct Cli {
    /// Console configuration file (`.json`, otherwise TOML).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> Result<ConsoleConfig, ConfigError> {
        match &self.config {
            None => Ok(ConsoleConfig::default()),
            Some(path) if path.extension().is_some_and(|ext| ext == "json") => {
                ConsoleConfig::from_json_file(path)
            }
            Some(path) => ConsoleConfig::from_toml_file(path),
        }
    }
}

fn run(config: ConsoleConfig) -> replkit_runtime::Result<ReplStats> {
    let muted = Arc::new(AtomicBool::new(false));
    let surface = SurfaceThread::start(EchoSurface {
        inner: MemorySurface::new(),
        muted: Arc::clone(&muted),
    })?;
    let ctx = ConsoleContext::new(Arc::new(CalcEngine::new()), CalcEngine::scope());
    let console = Arc::new(Console::new(ctx, surface.handle(), config)?);
    let host = ReplHost::spawn(Arc::clone(&console))?;

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim() == "!interrupt" {
            if !console.interrupt() {
                tracing::info!(target: "replkit.demo", "nothing to interrupt");
            }
            continue;
        }
        let console = Arc::clone(&console);
        let muted = Arc::clone(&muted);
        surface.with_surface(move |s| {
            if let Some(block) = line.strip_prefix("!paste ") {
                console.paste(&block.replace(';', "\n"), s);
                return;
            }
            // The terminal already echoed what was typed.
            muted.store(true, Ordering::Relaxed);
            for c in line.chars() {
                console.handle_key(Key::Char(c), s);
            }
            console.handle_key(Key::Enter, s);
            muted.store(false, Ordering::Relaxed);
        });
    }

    Ok(host.shutdown())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("replkit-demo: {err}");
            return ExitCode::FAILURE;
        }
    };
    match run(config) {
        Ok(stats) => {
            tracing::info!(
                target: "replkit.demo",
                statements = stats.statements,
                errors = stats.errors,
                "bye"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("replkit-demo: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn config_flag_takes_a_path() {
        let cli = Cli::try_parse_from(["replkit-demo", "--config", "console.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("console.toml")));
        assert!(Cli::try_parse_from(["replkit-demo"]).unwrap().config.is_none());
    }

    #[test]
    fn unknown_flags_and_missing_values_are_rejected() {
        let err = Cli::try_parse_from(["replkit-demo", "--confg", "x.toml"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert!(Cli::try_parse_from(["replkit-demo", "--config"]).is_err());
    }

    #[test]
    fn help_is_available() {
        let err = Cli::try_parse_from(["replkit-demo", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn json_and_toml_configs_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("console.json");
        std::fs::write(&json, r#"{"prompt": "$ "}"#).unwrap();
        let toml = dir.path().join("console.toml");
        std::fs::write(&toml, "prompt = \"% \"\n").unwrap();

        let cli = Cli { config: Some(json) };
        assert_eq!(cli.load_config().unwrap().prompt, "$ ");
        let cli = Cli { config: Some(toml) };
        assert_eq!(cli.load_config().unwrap().prompt, "% ");
        let cli = Cli {
            config: Some(dir.path().join("missing.toml")),
        };
        assert!(cli.load_config().is_err());
    }
}
