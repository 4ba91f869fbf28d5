#![forbid(unsafe_code)]

//! A complete console wired to [`CalcEngine`] for integration tests.

use std::sync::Arc;
use std::time::Duration;

use replkit_core::surface::PopupState;
use replkit_core::{Key, TextSurface};
use replkit_runtime::{
    Console, ConsoleConfig, ConsoleContext, DispatcherHandle, KeyOutcome, ReplHost, ReplStats,
    Result, SurfaceHandle, SurfaceThread,
};

use crate::calc::CalcEngine;
use crate::surface::SharedSurface;
use crate::wait_until;

/// Default wait for asynchronous console effects.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Surface thread, console and optionally a running REPL loop.
///
/// Field order is drop order: the REPL stops before the console, and the
/// surface thread outlives both.
pub struct ConsoleFixture {
    host: Option<ReplHost>,
    console: Arc<Console>,
    engine: Arc<CalcEngine>,
    surface: SharedSurface,
    thread: SurfaceThread<SharedSurface>,
}

impl ConsoleFixture {
    /// A console with no REPL loop; the test drives `read_line` itself.
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// A console whose commands run through `dispatcher`.
    pub fn with_dispatcher(config: ConsoleConfig, dispatcher: DispatcherHandle) -> Result<Self> {
        Self::build(config, Some(dispatcher))
    }

    /// A console with the REPL loop running; returns once the first prompt
    /// is on the surface.
    pub fn with_repl(config: ConsoleConfig) -> Result<Self> {
        let mut fixture = Self::build(config, None)?;
        fixture.host = Some(ReplHost::spawn(Arc::clone(&fixture.console))?);
        fixture.wait_for_prompt();
        Ok(fixture)
    }

    fn build(config: ConsoleConfig, dispatcher: Option<DispatcherHandle>) -> Result<Self> {
        let surface = SharedSurface::new();
        let thread = SurfaceThread::start(surface.clone())?;
        let engine = Arc::new(CalcEngine::new());
        let mut ctx = ConsoleContext::new(engine.clone(), CalcEngine::scope());
        if let Some(handle) = dispatcher {
            ctx = ctx.with_dispatcher(handle);
        }
        let console = Arc::new(Console::new(ctx, thread.handle(), config)?);
        Ok(Self {
            host: None,
            console,
            engine,
            surface,
            thread,
        })
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }

    pub fn engine(&self) -> &Arc<CalcEngine> {
        &self.engine
    }

    pub fn handle(&self) -> SurfaceHandle {
        self.thread.handle()
    }

    /// Deliver a keystroke on the surface thread.
    pub fn key(&self, key: Key) -> KeyOutcome {
        let console = Arc::clone(&self.console);
        self.thread
            .with_surface(move |s| console.handle_key(key, s))
            .unwrap_or(KeyOutcome::Ignored)
    }

    /// Type each character of `text`; returns the outcomes in order.
    pub fn type_text(&self, text: &str) -> Vec<KeyOutcome> {
        text.chars().map(|c| self.key(Key::Char(c))).collect()
    }

    /// Type `line` and press Enter.
    pub fn submit(&self, line: &str) -> KeyOutcome {
        self.type_text(line);
        self.key(Key::Enter)
    }

    pub fn paste(&self, text: &str) -> KeyOutcome {
        let console = Arc::clone(&self.console);
        let text = text.to_owned();
        self.thread
            .with_surface(move |s| console.paste(&text, s))
            .unwrap_or(KeyOutcome::Ignored)
    }

    /// Run `f` against the surface on the surface thread.
    pub fn with_surface<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn TextSurface) -> R + Send + 'static,
    {
        self.thread.with_surface(f)
    }

    /// Surface text once every job queued so far has run.
    pub fn text(&self) -> String {
        self.thread.with_surface(|s| s.text()).unwrap_or_default()
    }

    pub fn last_line(&self) -> String {
        self.thread
            .with_surface(|s| s.last_line_text())
            .unwrap_or_default()
    }

    pub fn popup(&self) -> Option<PopupState> {
        self.sync();
        self.surface.popup()
    }

    pub fn popups_opened(&self) -> usize {
        self.sync();
        self.surface.popups_opened()
    }

    /// Wait until queued surface jobs have run.
    pub fn sync(&self) {
        let _ = self.thread.with_surface(|_| ());
    }

    /// Wait until the surface text satisfies `pred`.
    pub fn wait_for_text(&self, pred: impl Fn(&str) -> bool) -> bool {
        wait_until(SETTLE_TIMEOUT, || pred(&self.text()))
    }

    /// Wait until the console is idle at a fresh primary prompt.
    pub fn wait_for_prompt(&self) -> bool {
        let prompt = self.console.config().prompt.clone();
        wait_until(SETTLE_TIMEOUT, || {
            !self.console.is_executing()
                && self.console.output().pending().is_empty()
                && self.last_line() == prompt
        })
    }

    /// Stop the REPL loop, if running, and return its counters.
    pub fn shutdown(mut self) -> ReplStats {
        match self.host.take() {
            Some(host) => host.shutdown(),
            None => {
                self.console.dispose();
                ReplStats::default()
            }
        }
    }
}
