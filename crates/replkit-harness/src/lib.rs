#![forbid(unsafe_code)]

//! Test harness and reference fixtures for replkit.
//!
//! - [`CalcEngine`]: a small deterministic script engine
//! - [`SharedSurface`]: an in-memory surface tests can inspect from outside
//!   the surface thread
//! - [`ConsoleFixture`]: surface thread, console and REPL loop wired together
//! - [`capture`]: tracing capture for log assertions
//!
//! The `replkit-demo` binary runs the same wiring over stdin/stdout.

pub mod calc;
pub mod capture;
pub mod fixture;
pub mod surface;

use std::time::{Duration, Instant};

pub use calc::{CalcEngine, CalcScope};
pub use capture::{CaptureLayer, CapturedEvent, EventLog};
pub use fixture::{ConsoleFixture, SETTLE_TIMEOUT};
pub use surface::SharedSurface;

/// Poll `cond` every few milliseconds until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_returns_early() {
        let start = Instant::now();
        assert!(wait_until(Duration::from_secs(5), || true));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(30), || false));
    }
}
