#![forbid(unsafe_code)]

//! Cooperative cancellation for units of work.
//!
//! A keyboard interrupt never tears down a thread. Instead every unit of work
//! receives a [`CancellationToken`]; the dispatcher (or completion pipeline)
//! owns the matching [`CancellationSource`] and cancels it when the user
//! interrupts. Script engines are expected to check the token at safe points
//! (loop back-edges, calls, blocking waits) and unwind with
//! [`Interrupted`].
//!
//! # Example
//!
//! ```
//! use replkit_runtime::cancellation::CancellationSource;
//! use std::time::Duration;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//!
//! let worker = std::thread::spawn(move || {
//!     // Sleeps are cut short by cancellation.
//!     token.sleep(Duration::from_secs(30))
//! });
//!
//! source.cancel();
//! assert!(worker.join().unwrap().is_err());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use web_time::Instant;

/// Marker returned by safe-point checks once cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyboardInterrupt")
    }
}

impl std::error::Error for Interrupted {}

/// A thread-safe, cloneable view of a cancellation request.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationInner>,
}

/// The control side of a token.
///
/// Dropping the source does **not** cancel its tokens.
pub struct CancellationSource {
    inner: Arc<CancellationInner>,
}

struct CancellationInner {
    cancelled: AtomicBool,
    notify: (Mutex<()>, Condvar),
}

impl CancellationInner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            notify: (Mutex::new(()), Condvar::new()),
        })
    }
}

impl CancellationSource {
    pub fn new() -> Self {
        Self {
            inner: CancellationInner::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Request cancellation and wake every pending [`CancellationToken::wait_timeout`].
    ///
    /// Idempotent. Returns `true` only for the call that flipped the state.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::AcqRel);
        let (lock, cvar) = &self.inner.notify;
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        cvar.notify_all();
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        CancellationSource::new().token()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Safe-point check for engines.
    #[inline]
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration` unless cancelled first.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        if self.wait_timeout(duration) {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Block until cancellation or timeout.
    ///
    /// Returns `true` if cancelled, `false` if the timeout elapsed.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let (lock, cvar) = &self.inner.notify;
        let mut guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let start = Instant::now();
        loop {
            if self.is_cancelled() {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return false;
            }
            let (next, _) = cvar
                .wait_timeout(guard, duration - elapsed)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn token_starts_uncancelled() {
        let source = CancellationSource::new();
        assert!(!source.token().is_cancelled());
        assert!(source.token().check().is_ok());
    }

    #[test]
    fn cancel_reaches_every_clone() {
        let source = CancellationSource::new();
        let t1 = source.token();
        let t2 = t1.clone();
        source.cancel();
        assert!(t1.is_cancelled());
        assert_eq!(t2.check(), Err(Interrupted));
    }

    #[test]
    fn cancel_reports_first_transition_only() {
        let source = CancellationSource::new();
        assert!(source.cancel());
        assert!(!source.cancel());
        assert!(source.is_cancelled());
    }

    #[test]
    fn drop_source_does_not_cancel() {
        let source = CancellationSource::new();
        let token = source.token();
        drop(source);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn sleep_completes_without_cancel() {
        let token = CancellationToken::never();
        assert!(token.sleep(Duration::from_millis(5)).is_ok());
    }

    #[test]
    fn sleep_is_cut_short_by_cancel() {
        let source = CancellationSource::new();
        let token = source.token();
        let start = Instant::now();
        let handle = thread::spawn(move || token.sleep(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        source.cancel();
        assert_eq!(handle.join().unwrap(), Err(Interrupted));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
