#![forbid(unsafe_code)]

//! Output writer: coalesced, surface-affine text appends.
//!
//! Any thread may call [`OutputWriter::write`]. Text is appended to a shared
//! buffer under a short lock; the first writer that finds no flush in flight
//! schedules one on the surface thread. The flush drains the buffer, applies
//! it at the end of the document, and re-checks the buffer before declaring
//! itself idle, so text that arrives during the hop is never stranded.
//!
//! # Invariants
//!
//! 1. Writes are applied in the order their `write` calls took the lock.
//! 2. `in_flight` is true from the moment a flush is scheduled until the
//!    flush observed an empty buffer under the lock.
//! 3. At most one flush job is queued or running at any time.
//!
//! [`OutputStream`] adapts the writer to [`std::io::Write`] for engines that
//! print through a byte stream.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock};

use regex_lite::{Captures, Regex};
use replkit_core::TextSurface;

use crate::surface_thread::SurfaceHandle;

#[derive(Debug, Default)]
struct WriterState {
    buffer: String,
    in_flight: bool,
}

/// Thread-safe writer into the surface.
#[derive(Clone)]
pub struct OutputWriter {
    state: Arc<Mutex<WriterState>>,
    surface: SurfaceHandle,
}

impl OutputWriter {
    pub fn new(surface: SurfaceHandle) -> Self {
        Self {
            state: Arc::new(Mutex::new(WriterState::default())),
            surface,
        }
    }

    /// Append `text` at the end of the surface, asynchronously.
    pub fn write(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let text = normalize_newlines(text);
        let schedule = {
            let mut state = self.lock();
            state.buffer.push_str(&text);
            !std::mem::replace(&mut state.in_flight, true)
        };
        if schedule {
            let state = Arc::clone(&self.state);
            self.surface.post(move |surface| flush(&state, surface));
        }
    }

    /// Apply `text` directly; the caller must be on the surface thread.
    pub fn write_now(&self, surface: &mut dyn TextSurface, text: &str, move_to_end: bool) {
        if move_to_end {
            surface.move_to_end();
        }
        surface.insert_text(&normalize_newlines(text));
    }

    /// A flush is scheduled or running.
    pub fn write_in_progress(&self) -> bool {
        self.lock().in_flight
    }

    /// Text buffered but not yet applied.
    pub fn pending(&self) -> String {
        self.lock().buffer.clone()
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for OutputWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputWriter")
            .field("in_flight", &self.write_in_progress())
            .finish()
    }
}

fn flush(state: &Mutex<WriterState>, surface: &mut dyn TextSurface) {
    let mut rounds = 0_u32;
    loop {
        let chunk = {
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            if state.buffer.is_empty() {
                state.in_flight = false;
                break;
            }
            std::mem::take(&mut state.buffer)
        };
        rounds += 1;
        surface.move_to_end();
        surface.insert_text(&chunk);
    }
    tracing::trace!(target: "replkit.output", rounds, "flush complete");
}

/// Collapse `\r\r\n` and `\r\n` into `\n`.
pub fn normalize_newlines(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains('\r') {
        text.replace("\r\r\n", "\n").replace("\r\n", "\n").into()
    } else {
        text.into()
    }
}

fn unicode_escape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\u[0-9a-fA-F]{4}").expect("static pattern"))
}

/// Replace literal `\uXXXX` sequences with the characters they name.
///
/// Sequences naming a surrogate (not a valid `char`) are left untouched.
pub fn decode_unicode_escapes(text: &str) -> std::borrow::Cow<'_, str> {
    unicode_escape_regex().replace_all(text, |caps: &Captures<'_>| {
        let raw = &caps[0];
        u32::from_str_radix(&raw[2..], 16)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(|| raw.to_owned(), String::from)
    })
}

/// A byte stream that forwards UTF-8 text to an [`OutputWriter`].
///
/// Incomplete UTF-8 sequences at the end of a `write` are held back until
/// the rest arrives, so multi-byte characters are never torn.
pub struct OutputStream {
    writer: OutputWriter,
    pending: Vec<u8>,
}

impl OutputStream {
    pub fn new(writer: OutputWriter) -> Self {
        Self {
            writer,
            pending: Vec::new(),
        }
    }

    fn forward(&mut self, text: &str) {
        self.writer.write(&decode_unicode_escapes(text));
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                self.forward(&text);
                return Ok(buf.len());
            }
        };
        let rest = self.pending.split_off(valid_up_to);
        let complete = std::mem::replace(&mut self.pending, rest);
        if let Ok(text) = std::str::from_utf8(&complete) {
            self.forward(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.forward(&text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface_thread::SurfaceThread;
    use replkit_core::MemorySurface;

    #[test]
    fn newlines_are_normalized() {
        assert_eq!(normalize_newlines("a\r\nb\r\r\nc\n"), "a\nb\nc\n");
        assert_eq!(normalize_newlines("plain"), "plain");
    }

    #[test]
    fn unicode_escapes_are_decoded() {
        assert_eq!(decode_unicode_escapes(r"café"), "café");
        assert_eq!(decode_unicode_escapes(r"\ud800 stays"), r"\ud800 stays");
        assert_eq!(decode_unicode_escapes(r"\u12"), r"\u12");
    }

    #[test]
    fn writes_reach_surface_in_order() {
        let thread = SurfaceThread::start(MemorySurface::new()).unwrap();
        let writer = OutputWriter::new(thread.handle());
        writer.write("A");
        writer.write("B\r\n");
        writer.write("C");
        let text = thread.with_surface(|s| s.text()).unwrap();
        assert_eq!(text, "AB\nC");
        assert!(!writer.write_in_progress());
    }

    #[test]
    fn flush_appends_at_end_even_if_caret_moved() {
        let thread = SurfaceThread::start(MemorySurface::with_text(">>> ")).unwrap();
        let writer = OutputWriter::new(thread.handle());
        thread.with_surface(|s| s.set_caret(replkit_core::Position::new(1, 1)));
        writer.write("out");
        let text = thread.with_surface(|s| s.text()).unwrap();
        assert_eq!(text, ">>> out");
    }

    #[test]
    fn stream_holds_back_split_utf8() {
        let thread = SurfaceThread::start(MemorySurface::new()).unwrap();
        let mut stream = OutputStream::new(OutputWriter::new(thread.handle()));
        let bytes = "é!".as_bytes();
        stream.write_all(&bytes[..1]).unwrap();
        stream.write_all(&bytes[1..]).unwrap();
        stream.flush().unwrap();
        let text = thread.with_surface(|s| s.text()).unwrap();
        assert_eq!(text, "é!");
    }
}
