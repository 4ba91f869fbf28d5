#![forbid(unsafe_code)]

//! Line broker between the surface thread and the REPL thread.
//!
//! The surface thread submits completed input lines; the REPL thread blocks
//! in [`LineBroker::read_line`] until one arrives or the broker is disposed.
//!
//! Lines already queued when `dispose` is called are still delivered: data
//! wins over disposal. Only an empty, disposed broker reports end of input.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use web_time::Instant;

#[derive(Debug, Default)]
struct BrokerState {
    queue: VecDeque<String>,
    disposed: bool,
}

/// FIFO of entered lines with a blocking reader side.
#[derive(Debug, Default)]
pub struct LineBroker {
    state: Mutex<BrokerState>,
    ready: Condvar,
}

impl LineBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line and wake one reader.
    ///
    /// Lines submitted after disposal are dropped.
    pub fn submit_line(&self, line: impl Into<String>) {
        let mut state = self.lock();
        if state.disposed {
            tracing::debug!(target: "replkit.broker", "line submitted after dispose; dropped");
            return;
        }
        state.queue.push_back(line.into());
        tracing::trace!(target: "replkit.broker", queued = state.queue.len(), "line submitted");
        drop(state);
        self.ready.notify_one();
    }

    /// Block until a line is available; `None` once disposed and drained.
    pub fn read_line(&self) -> Option<String> {
        let mut state = self.lock();
        loop {
            if let Some(line) = state.queue.pop_front() {
                return Some(line);
            }
            if state.disposed {
                return None;
            }
            state = self.ready.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`read_line`](Self::read_line) but gives up after `timeout`.
    pub fn read_line_timeout(&self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(line) = state.queue.pop_front() {
                return Some(line);
            }
            if state.disposed {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (next, _) = self
                .ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner());
            state = next;
        }
    }

    /// Signal end of input to every reader. Idempotent.
    pub fn dispose(&self) -> bool {
        let mut state = self.lock();
        let first = !std::mem::replace(&mut state.disposed, true);
        drop(state);
        if first {
            tracing::debug!(target: "replkit.broker", "disposed");
        }
        self.ready.notify_all();
        first
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Snapshot of lines not yet consumed, oldest first.
    pub fn unread_lines(&self) -> Vec<String> {
        self.lock().queue.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lines_come_out_in_order() {
        let broker = LineBroker::new();
        broker.submit_line("a");
        broker.submit_line("b");
        assert_eq!(broker.unread_lines(), ["a", "b"]);
        assert_eq!(broker.read_line().as_deref(), Some("a"));
        assert_eq!(broker.read_line().as_deref(), Some("b"));
        assert!(broker.unread_lines().is_empty());
    }

    #[test]
    fn blocked_reader_wakes_on_submit() {
        let broker = Arc::new(LineBroker::new());
        let reader = {
            let broker = Arc::clone(&broker);
            thread::spawn(move || broker.read_line())
        };
        thread::sleep(Duration::from_millis(20));
        broker.submit_line("1+1");
        assert_eq!(reader.join().unwrap().as_deref(), Some("1+1"));
    }

    #[test]
    fn dispose_unblocks_reader() {
        let broker = Arc::new(LineBroker::new());
        let reader = {
            let broker = Arc::clone(&broker);
            thread::spawn(move || broker.read_line())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(broker.dispose());
        assert_eq!(reader.join().unwrap(), None);
    }

    #[test]
    fn queued_data_wins_over_disposal() {
        let broker = LineBroker::new();
        broker.submit_line("last");
        broker.dispose();
        assert_eq!(broker.read_line().as_deref(), Some("last"));
        assert_eq!(broker.read_line(), None);
    }

    #[test]
    fn dispose_is_idempotent() {
        let broker = LineBroker::new();
        assert!(broker.dispose());
        assert!(!broker.dispose());
        assert!(broker.is_disposed());
        broker.submit_line("ignored");
        assert!(broker.unread_lines().is_empty());
    }

    #[test]
    fn read_timeout_expires() {
        let broker = LineBroker::new();
        let start = Instant::now();
        assert_eq!(broker.read_line_timeout(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
