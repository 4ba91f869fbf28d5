#![forbid(unsafe_code)]

//! The console façade.
//!
//! [`Console`] ties the pieces together for one logical console:
//!
//! - keystrokes arrive on the surface thread through [`Console::handle_key`]
//!   and are gated by the read-only region policy;
//! - Enter submits the input line to the [`LineBroker`] and the history;
//! - the REPL thread blocks in [`Console::read_line`] and runs what it reads
//!   through the [`CommandDispatcher`];
//! - output from any thread goes through the [`OutputWriter`];
//! - `.` and Ctrl+Space feed the [`CompletionPipeline`].
//!
//! The console never blocks the surface thread on engine work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use replkit_core::{
    CommandHistory, EditContext, Key, Position, Style, TextSurface, region::home_position,
};

use crate::broker::LineBroker;
use crate::completion::{
    CompletionPipeline, CompletionWindow, DescribeRequest, SharedWindow, ShowRequest, lock_window,
};
use crate::config::ConsoleConfig;
use crate::dispatcher::{
    CommandDispatcher, DispatchOutcome, DispatchTurn, DispatcherHandle, WorkerThread,
};
use crate::engine::{
    CompileOutcome, CompiledUnit, Diagnostic, ExecutionFault, ScopeHandle, ScriptEngine,
    SourceKind,
};
use crate::error::{ConsoleError, Result, format_diagnostics};
use crate::output::{OutputStream, OutputWriter, normalize_newlines};
use crate::surface_thread::SurfaceHandle;

/// Everything a console needs from its host.
pub struct ConsoleContext {
    pub engine: Arc<dyn ScriptEngine>,
    pub scope: ScopeHandle,
    /// Execution target; a dedicated worker thread when `None`.
    pub dispatcher: Option<DispatcherHandle>,
}

impl ConsoleContext {
    pub fn new(engine: Arc<dyn ScriptEngine>, scope: ScopeHandle) -> Self {
        Self {
            engine,
            scope,
            dispatcher: None,
        }
    }

    #[must_use]
    pub fn with_dispatcher(mut self, handle: DispatcherHandle) -> Self {
        self.dispatcher = Some(handle);
        self
    }
}

/// Prompt bookkeeping.
///
/// Consecutive prompt writes on one line accumulate, so a continuation
/// prompt followed by auto-indent counts as one read-only prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptState {
    len: usize,
    extending: bool,
    initialized: bool,
}

impl PromptState {
    /// Length of the read-only prefix on the input line, in characters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A prompt has been written at least once.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Account for a write; returns `true` on the very first prompt.
    pub fn record(&mut self, text: &str, style: Style) -> bool {
        if style != Style::Prompt {
            if !text.is_empty() {
                self.extending = false;
            }
            return false;
        }
        match text.rfind('\n') {
            Some(idx) => self.len = text[idx + 1..].chars().count(),
            None if self.extending => self.len += text.chars().count(),
            None => self.len = text.chars().count(),
        }
        self.extending = true;
        !std::mem::replace(&mut self.initialized, true)
    }

    /// The input line was ended on the surface; the next prompt starts fresh.
    pub fn end_line(&mut self) {
        self.extending = false;
    }
}

/// What [`Console::handle_key`] did with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The console applied the key to the surface.
    Applied,
    /// The read-only region policy refused the key; nothing changed.
    Rejected,
    /// The key was swallowed without effect.
    Ignored,
    /// An input line (or pasted block) was submitted for execution.
    Submitted,
    /// The running command was interrupted.
    Interrupted,
    /// Not a console key in the current state; the host may handle it.
    Unhandled,
}

type InitCallback = Box<dyn FnOnce() + Send>;

struct Inner {
    config: ConsoleConfig,
    engine: Arc<dyn ScriptEngine>,
    scope: ScopeHandle,
    surface: SurfaceHandle,
    output: OutputWriter,
    broker: LineBroker,
    history: Mutex<CommandHistory>,
    prompt: Mutex<PromptState>,
    dispatcher: CommandDispatcher,
    completion: CompletionPipeline,
    window: SharedWindow,
    on_initialized: Mutex<Vec<InitCallback>>,
    disposed: AtomicBool,
}

/// An interactive console bound to one engine and one surface.
pub struct Console {
    inner: Arc<Inner>,
    _worker: Option<WorkerThread>,
}

impl Console {
    pub fn new(ctx: ConsoleContext, surface: SurfaceHandle, config: ConsoleConfig) -> Result<Self> {
        let config = config.validated()?;
        let output = OutputWriter::new(surface.clone());
        ctx.engine.set_output(OutputStream::new(output.clone()));

        let (worker, handle) = match ctx.dispatcher {
            Some(handle) => (None, handle),
            None => {
                let worker = WorkerThread::spawn("replkit-exec")?;
                let handle = DispatcherHandle::from_worker(&worker);
                (Some(worker), handle)
            }
        };
        let dispatcher = CommandDispatcher::new(handle, config.poll_interval());
        let completion = CompletionPipeline::start(
            Arc::clone(&ctx.engine),
            ctx.scope.clone(),
            surface.clone(),
            &config,
        )?;
        let window = completion.window();

        tracing::debug!(target: "replkit.console", prompt = %config.prompt, "console created");
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                engine: ctx.engine,
                scope: ctx.scope,
                surface,
                output,
                broker: LineBroker::new(),
                history: Mutex::new(CommandHistory::new()),
                prompt: Mutex::new(PromptState::default()),
                dispatcher,
                completion,
                window,
                on_initialized: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
            _worker: worker,
        })
    }

    // ── Host-facing API ──────────────────────────────────────────────

    /// Block until the user enters a line; `None` once disposed.
    ///
    /// `auto_indent` spaces are written as part of the prompt first and
    /// prefixed to the returned line.
    pub fn read_line(&self, auto_indent: usize) -> Option<String> {
        let indent = " ".repeat(auto_indent);
        if auto_indent > 0 {
            self.write(&indent, Style::Prompt);
        }
        self.inner.broker.read_line().map(|line| indent + &line)
    }

    pub fn write(&self, text: &str, style: Style) {
        self.inner.write(text, style);
    }

    pub fn write_line(&self, text: &str, style: Style) {
        self.inner.write(&format!("{text}\n"), style);
    }

    /// Run `statements` on a background thread, as if pasted at a fresh prompt.
    ///
    /// The caret moves to the home position at once; the statements wait
    /// behind any command still executing. The returned handle yields the
    /// reported error, if any. Fails with
    /// [`ConsoleError::Disposed`] once the console is disposed.
    pub fn run_statements(&self, statements: &str) -> Result<JoinHandle<Result<()>>> {
        if self.is_disposed() {
            return Err(ConsoleError::Disposed);
        }
        let prompt_len = self.prompt_len();
        self.inner.surface.post(move |surface| {
            surface.set_caret(home_position(surface.line_count(), prompt_len));
        });
        spawn_statements(&self.inner, statements.to_owned())
    }

    /// Compile `source`; `Ok(None)` means more input is needed.
    pub fn compile(&self, source: &str, kind: SourceKind) -> Result<Option<CompiledUnit>> {
        self.inner.compile(source, kind)
    }

    /// Execute a compiled unit through the command dispatcher.
    pub fn execute_unit(&self, unit: CompiledUnit) -> Result<()> {
        self.inner.execute_unit(unit)
    }

    /// Execute `unit`, report a failure and write `prompt`.
    ///
    /// Statements queued meanwhile by [`run_statements`](Self::run_statements)
    /// or a paste start only after the prompt is written.
    pub fn execute_and_prompt(&self, unit: CompiledUnit, prompt: &str) -> Result<()> {
        let turn = self.inner.dispatcher.begin();
        let result = self.inner.execute_in_turn(&turn, unit);
        if let Err(err) = &result {
            self.inner.report(err);
        }
        self.inner.write(prompt, Style::Prompt);
        result
    }

    /// Write a reported error to the console output.
    pub fn report(&self, err: &ConsoleError) {
        self.inner.report(err);
    }

    pub fn set_command_dispatcher(&self, handle: DispatcherHandle) {
        self.inner.dispatcher.set_handle(handle);
    }

    pub fn command_dispatcher(&self) -> DispatcherHandle {
        self.inner.dispatcher.handle()
    }

    /// Keyboard interrupt of the running command. `false` when idle.
    pub fn interrupt(&self) -> bool {
        self.inner.dispatcher.interrupt()
    }

    pub fn is_executing(&self) -> bool {
        self.inner.dispatcher.is_executing()
    }

    /// Release every blocked reader and stop completion. Idempotent.
    pub fn dispose(&self) -> bool {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.broker.dispose();
        self.inner.completion.stop();
        tracing::info!(target: "replkit.console", "console disposed");
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Run `f` once the first prompt has been written (now, if it has).
    pub fn when_initialized(&self, f: impl FnOnce() + Send + 'static) {
        let prompt = self.inner.prompt();
        if prompt.is_initialized() {
            drop(prompt);
            f();
        } else {
            self.inner.callbacks().push(Box::new(f));
        }
    }

    /// Lines entered but not yet read.
    pub fn unread_lines(&self) -> Vec<String> {
        self.inner.broker.unread_lines()
    }

    /// Snapshot of the command history.
    pub fn history(&self) -> CommandHistory {
        self.inner.history().clone()
    }

    pub fn prompt_len(&self) -> usize {
        self.inner.prompt().len()
    }

    pub fn prompt_state(&self) -> PromptState {
        *self.inner.prompt()
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    pub fn engine(&self) -> &Arc<dyn ScriptEngine> {
        &self.inner.engine
    }

    pub fn output(&self) -> &OutputWriter {
        &self.inner.output
    }

    pub fn completion(&self) -> &CompletionPipeline {
        &self.inner.completion
    }

    // ── Surface-thread API ───────────────────────────────────────────

    /// React to a keystroke. Must be called on the surface thread.
    pub fn handle_key(&self, key: Key, surface: &mut dyn TextSurface) -> KeyOutcome {
        let prompt_len = self.prompt_len();
        if self.window_is_open() {
            match key {
                Key::Escape => {
                    self.close_window(surface);
                    return KeyOutcome::Applied;
                }
                Key::Up => return self.move_completion(surface, -1),
                Key::Down => return self.move_completion(surface, 1),
                Key::Tab => {
                    self.commit_completion(surface);
                    return KeyOutcome::Applied;
                }
                Key::Enter => {
                    self.close_window(surface);
                }
                Key::Char(c) if !Key::keeps_completion_open(c) => {
                    self.commit_completion(surface);
                }
                _ => {}
            }
        }

        let ctx = EditContext::from_surface(surface, prompt_len);
        match key {
            Key::Char(c) => {
                if !ctx.can_insert() {
                    return KeyOutcome::Rejected;
                }
                let mut buf = [0_u8; 4];
                surface.insert_text(c.encode_utf8(&mut buf));
                if self.window_is_open() {
                    self.refresh_window(surface);
                } else if c == '.' && self.inner.config.full_autocompletion {
                    self.request_completion(surface, prompt_len);
                }
                KeyOutcome::Applied
            }
            Key::CtrlSpace => {
                if ctx.is_in_read_only_region() {
                    return KeyOutcome::Rejected;
                }
                if self.inner.config.ctrl_space_autocompletion {
                    self.request_completion(surface, prompt_len);
                }
                KeyOutcome::Applied
            }
            Key::Tab => {
                if ctx.is_in_read_only_region() {
                    return KeyOutcome::Rejected;
                }
                surface.insert_text("\t");
                KeyOutcome::Applied
            }
            Key::Backspace => {
                if !ctx.can_backspace() {
                    return KeyOutcome::Rejected;
                }
                surface.backspace();
                if self.window_is_open() {
                    self.refresh_window(surface);
                }
                KeyOutcome::Applied
            }
            Key::Delete => {
                if !ctx.can_delete() {
                    return KeyOutcome::Rejected;
                }
                surface.delete_forward();
                KeyOutcome::Applied
            }
            Key::Home => {
                surface.set_caret(ctx.home_position());
                KeyOutcome::Applied
            }
            Key::Up => {
                if !ctx.can_navigate_history() {
                    return KeyOutcome::Rejected;
                }
                let mut history = self.inner.history();
                if history.move_previous() {
                    let line = history.current().unwrap_or_default().to_owned();
                    drop(history);
                    replace_input(surface, prompt_len, &line);
                }
                KeyOutcome::Applied
            }
            Key::Down => {
                if !ctx.can_navigate_history() {
                    return KeyOutcome::Rejected;
                }
                let mut history = self.inner.history();
                if history.move_next() {
                    let line = history.current().unwrap_or_default().to_owned();
                    drop(history);
                    replace_input(surface, prompt_len, &line);
                }
                KeyOutcome::Applied
            }
            Key::Escape => KeyOutcome::Unhandled,
            Key::Enter => self.enter(surface, &ctx, prompt_len),
            Key::Interrupt => {
                if surface.selection().is_some_and(|sel| !sel.is_empty()) {
                    return KeyOutcome::Unhandled;
                }
                if !self.inner.dispatcher.is_executing() {
                    return KeyOutcome::Unhandled;
                }
                surface.set_caret(ctx.home_position());
                if self.inner.dispatcher.interrupt() {
                    KeyOutcome::Interrupted
                } else {
                    KeyOutcome::Ignored
                }
            }
        }
    }

    /// Paste `text` at the caret. Must be called on the surface thread.
    ///
    /// A multi-line paste is echoed with continuation prefixes and run as a
    /// block of statements.
    pub fn paste(&self, text: &str, surface: &mut dyn TextSurface) -> KeyOutcome {
        let ctx = EditContext::from_surface(surface, self.prompt_len());
        if !ctx.can_insert() {
            return KeyOutcome::Rejected;
        }
        let text = normalize_newlines(text);
        let commands: Vec<&str> = text.split('\n').collect();
        if commands.len() <= 1 {
            surface.insert_text(&text);
            return KeyOutcome::Applied;
        }

        let config = &self.inner.config;
        let tab = " ".repeat(config.paste_tab_width);
        let mut echo = String::from("\n");
        let mut script = String::new();
        for command in &commands {
            echo.push_str(&config.paste_continuation_prefix);
            echo.push_str(command);
            echo.push('\n');
            script.push_str(&command.replace('\t', &tab));
            script.push('\n');
        }
        self.inner.output.write_now(surface, &echo, false);
        self.inner.prompt().end_line();

        tracing::debug!(target: "replkit.console", lines = commands.len(), "multi-line paste");
        match spawn_statements(&self.inner, script) {
            Ok(_) => KeyOutcome::Submitted,
            Err(err) => {
                tracing::error!(target: "replkit.console", error = %err, "cannot run pasted statements");
                KeyOutcome::Ignored
            }
        }
    }

    fn enter(&self, surface: &mut dyn TextSurface, ctx: &EditContext, prompt_len: usize) -> KeyOutcome {
        if ctx.is_in_read_only_region() {
            return KeyOutcome::Rejected;
        }
        self.inner.completion.stop();
        if self.inner.output.write_in_progress() {
            tracing::debug!(target: "replkit.console", "enter ignored; write in progress");
            return KeyOutcome::Ignored;
        }
        surface.move_to_end();
        let line: String = surface.last_line_text().chars().skip(prompt_len).collect();
        self.inner.history().add(&line);
        tracing::debug!(target: "replkit.console", len = line.len(), "line submitted");
        surface.insert_text("\n");
        self.inner.prompt().end_line();
        self.inner.broker.submit_line(line);
        KeyOutcome::Submitted
    }

    // ── Completion window ────────────────────────────────────────────

    fn window_is_open(&self) -> bool {
        lock_window(&self.inner.window).is_some()
    }

    fn request_completion(&self, surface: &dyn TextSurface, prompt_len: usize) {
        self.inner
            .completion
            .show(ShowRequest::from_surface(surface, prompt_len));
    }

    fn close_window(&self, surface: &mut dyn TextSurface) {
        if lock_window(&self.inner.window).take().is_some() {
            surface.close_completions();
            self.inner.completion.cancel_describe();
        }
    }

    /// Replace the typed member prefix with the selected item.
    fn commit_completion(&self, surface: &mut dyn TextSurface) {
        let Some(window) = lock_window(&self.inner.window).take() else {
            return;
        };
        surface.close_completions();
        self.inner.completion.cancel_describe();
        self.inner.completion.stop();
        let Some(item) = window.selected() else {
            return;
        };
        let caret = surface.caret();
        if caret.line != window.line() || caret.column < window.start_column() {
            return;
        }
        surface.replace(Position::new(window.line(), window.start_column()), caret, &item.text);
    }

    /// Re-filter after the typed prefix changed; closes when the caret left it.
    fn refresh_window(&self, surface: &mut dyn TextSurface) {
        let caret = surface.caret();
        let mut slot = lock_window(&self.inner.window);
        let Some(window) = slot.as_mut() else {
            return;
        };
        if caret.line != window.line() || caret.column < window.start_column() {
            slot.take();
            drop(slot);
            surface.close_completions();
            self.inner.completion.cancel_describe();
            return;
        }
        let prefix: String = surface
            .line_text(caret.line)
            .chars()
            .skip(window.start_column() - 1)
            .take(caret.column - window.start_column())
            .collect();
        let selected = window.select_matching(&prefix);
        surface.select_completion(selected);
        self.describe_selected(window);
    }

    fn move_completion(&self, surface: &mut dyn TextSurface, delta: isize) -> KeyOutcome {
        let mut slot = lock_window(&self.inner.window);
        if let Some(window) = slot.as_mut() {
            let selected = window.move_selection(delta);
            surface.select_completion(selected);
            self.describe_selected(window);
        }
        KeyOutcome::Applied
    }

    fn describe_selected(&self, window: &CompletionWindow) {
        match window.selected() {
            Some(item) => self.inner.completion.describe(DescribeRequest {
                stub: item.stub.clone(),
                item: item.text.clone(),
                is_instance: item.is_instance,
            }),
            None => self.inner.completion.cancel_describe(),
        }
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.dispose();
        self.inner.dispatcher.interrupt();
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("prompt", &self.prompt_state())
            .field("dispatcher", &self.inner.dispatcher)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Inner {
    fn prompt(&self) -> MutexGuard<'_, PromptState> {
        self.prompt.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn history(&self) -> MutexGuard<'_, CommandHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn callbacks(&self) -> MutexGuard<'_, Vec<InitCallback>> {
        self.on_initialized.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, text: &str, style: Style) {
        tracing::trace!(target: "replkit.console", style = style.as_str(), len = text.len(), "write");
        self.output.write(text);
        let first_prompt = self.prompt().record(text, style);
        if first_prompt {
            let callbacks = std::mem::take(&mut *self.callbacks());
            tracing::debug!(target: "replkit.console", callbacks = callbacks.len(), "console initialized");
            for callback in callbacks {
                callback();
            }
        }
    }

    fn compile(&self, source: &str, kind: SourceKind) -> Result<Option<CompiledUnit>> {
        match self.engine.compile(source, kind) {
            CompileOutcome::Complete(unit) => Ok(Some(unit)),
            CompileOutcome::Incomplete if kind == SourceKind::Interactive => Ok(None),
            CompileOutcome::Incomplete => Err(ConsoleError::Compilation(vec![Diagnostic::new(
                "unexpected end of input",
                source.lines().count().max(1),
            )])),
            CompileOutcome::Errors(diagnostics) => Err(ConsoleError::Compilation(diagnostics)),
        }
    }

    fn execute_unit(&self, unit: CompiledUnit) -> Result<()> {
        self.execute_in_turn(&self.dispatcher.begin(), unit)
    }

    fn execute_in_turn(&self, turn: &DispatchTurn<'_>, unit: CompiledUnit) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        let scope = self.scope.clone();
        let slot: Arc<Mutex<Option<std::result::Result<(), ExecutionFault>>>> =
            Arc::new(Mutex::new(None));
        let result = Arc::clone(&slot);
        let outcome = turn.dispatch(move |token| {
            let outcome = engine.execute(&unit, &scope, &token);
            *result.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
        });
        if outcome == DispatchOutcome::Interrupted {
            return Err(ConsoleError::Interrupted);
        }
        let finished = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        match finished {
            Some(Ok(())) => Ok(()),
            Some(Err(fault)) => Err(fault.into()),
            None => Err(ConsoleError::Execution(ExecutionFault::raised(
                "RuntimeError",
                "execution did not complete",
            ))),
        }
    }

    fn report(&self, err: &ConsoleError) {
        let text = match err {
            ConsoleError::Compilation(diagnostics) => format_diagnostics(diagnostics),
            ConsoleError::Execution(fault) => {
                format!("Exception : {}", self.engine.format_fault(fault))
            }
            ConsoleError::Interrupted => "KeyboardInterrupt".to_owned(),
            other => {
                tracing::debug!(target: "replkit.console", error = %other, "error not reported");
                return;
            }
        };
        tracing::debug!(target: "replkit.console", kind = err.kind(), "error reported");
        self.write(&format!("{text}\n"), Style::Error);
    }

    /// Runs behind any unit already in flight; nothing is written until then.
    fn execute_statements(&self, script: &str) -> Result<()> {
        let turn = self.dispatcher.begin();
        let _span = tracing::debug_span!(target: "replkit.console", "statements").entered();
        self.write("\n", Style::Output);
        let result = self
            .compile(script, SourceKind::Statements)
            .and_then(|unit| match unit {
                Some(unit) => self.execute_in_turn(&turn, unit),
                None => Ok(()),
            });
        if let Err(err) = &result {
            self.report(err);
        }
        self.write(&self.config.prompt, Style::Prompt);
        result
    }
}

fn spawn_statements(inner: &Arc<Inner>, script: String) -> Result<JoinHandle<Result<()>>> {
    let inner = Arc::clone(inner);
    thread::Builder::new()
        .name("replkit-statements".into())
        .spawn(move || inner.execute_statements(&script))
        .map_err(|source| ConsoleError::Spawn {
            thread: "statements",
            source,
        })
}

/// Replace the input after the prompt on the last line; caret at its end.
fn replace_input(surface: &mut dyn TextSurface, prompt_len: usize, text: &str) {
    let line = surface.line_count();
    let len = surface.line_len(line);
    let start = Position::new(line, (prompt_len + 1).min(len + 1));
    surface.replace(start, Position::new(line, len + 1), text);
    surface.set_caret(Position::new(line, prompt_len + text.chars().count() + 1));
}
