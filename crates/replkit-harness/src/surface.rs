#![forbid(unsafe_code)]

//! A surface that tests can inspect while the surface thread owns it.

use std::sync::{Arc, Mutex, MutexGuard};

use replkit_core::surface::PopupState;
use replkit_core::{MemorySurface, Position, Selection, TextSurface};

/// [`MemorySurface`] behind a shared lock.
///
/// One clone is moved into the [`SurfaceThread`](replkit_runtime::SurfaceThread);
/// the test keeps another to read popup state that the [`TextSurface`]
/// trait does not expose.
#[derive(Debug, Clone, Default)]
pub struct SharedSurface {
    inner: Arc<Mutex<MemorySurface>>,
}

impl SharedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, MemorySurface> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn popup(&self) -> Option<PopupState> {
        self.lock().popup().cloned()
    }

    pub fn popups_opened(&self) -> usize {
        self.lock().popups_opened()
    }
}

impl TextSurface for SharedSurface {
    fn line_count(&self) -> usize {
        self.lock().line_count()
    }

    fn line_text(&self, line: usize) -> String {
        self.lock().line_text(line)
    }

    fn caret(&self) -> Position {
        self.lock().caret()
    }

    fn set_caret(&mut self, position: Position) {
        self.lock().set_caret(position);
    }

    fn selection(&self) -> Option<Selection> {
        self.lock().selection()
    }

    fn set_selection(&mut self, selection: Option<Selection>) {
        self.lock().set_selection(selection);
    }

    fn replace(&mut self, start: Position, end: Position, text: &str) {
        self.lock().replace(start, end, text);
    }

    fn show_completions(&mut self, items: &[String], selected: Option<usize>) {
        self.lock().show_completions(items, selected);
    }

    fn select_completion(&mut self, index: Option<usize>) {
        self.lock().select_completion(index);
    }

    fn close_completions(&mut self) {
        self.lock().close_completions();
    }

    fn show_description(&mut self, description: Option<&str>) {
        self.lock().show_description(description);
    }
}
