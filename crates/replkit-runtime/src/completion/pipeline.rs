#![forbid(unsafe_code)]

//! Background completion worker.
//!
//! One low-priority thread serves two kinds of request fed through a single
//! channel:
//!
//! - **show**: split the caret text, resolve members, and open a completion
//!   window on the surface thread. A show request that arrives while another
//!   is still queued replaces it; results of a request that was superseded
//!   or stopped before they reached the surface are discarded.
//! - **describe**: fetch documentation for the highlighted item after the
//!   debounce delay. Each new describe request restarts the delay.
//!
//! Lookups run through a [`DispatcherHandle`] (inline on the worker by
//! default) so hosts can force engine access onto a thread of their
//! choosing. A lookup is interruptible through [`CompletionPipeline::stop`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwap;
use replkit_core::{TextSurface, split_completion_prefix};
use web_time::Instant;

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::config::ConsoleConfig;
use crate::dispatcher::DispatcherHandle;
use crate::engine::{DocQuery, ScopeHandle, ScriptEngine};
use crate::error::ConsoleError;
use crate::surface_thread::SurfaceHandle;

use super::item::CompletionWindow;
use super::resolver::{ChainResolver, MemberResolver};

/// The open completion window, owned by the surface thread.
pub type SharedWindow = Arc<Mutex<Option<CompletionWindow>>>;

/// Lock a [`SharedWindow`], recovering from poisoning.
pub fn lock_window(window: &SharedWindow) -> MutexGuard<'_, Option<CompletionWindow>> {
    window.lock().unwrap_or_else(|e| e.into_inner())
}

/// Request to list completions for the text before the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowRequest {
    /// Input text from the end of the prompt up to the caret.
    pub text: String,
    pub line: usize,
    pub caret_column: usize,
}

impl ShowRequest {
    /// Capture the caret text of `surface`, skipping `prompt_len` columns.
    pub fn from_surface(surface: &dyn TextSurface, prompt_len: usize) -> Self {
        let caret = surface.caret();
        Self {
            text: surface.text_before_caret().chars().skip(prompt_len).collect(),
            line: caret.line,
            caret_column: caret.column,
        }
    }
}

/// Request to describe one completion item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeRequest {
    pub stub: String,
    pub item: String,
    pub is_instance: bool,
}

enum Request {
    Show(u64, ShowRequest),
    Describe(DescribeRequest),
    CancelDescribe,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    exclude_callables: bool,
    description_delay: Duration,
}

struct Shared {
    requests: Mutex<mpsc::Sender<Request>>,
    generation: AtomicU64,
    in_progress: Mutex<Option<CancellationSource>>,
    lookup: ArcSwap<DispatcherHandle>,
    window: SharedWindow,
}

impl Shared {
    fn send(&self, request: Request) {
        let sender = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        if sender.send(request).is_err() {
            tracing::debug!(target: "replkit.completion", "completion thread gone; request dropped");
        }
    }

    fn in_progress(&self) -> MutexGuard<'_, Option<CancellationSource>> {
        self.in_progress.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle to the completion thread.
pub struct CompletionPipeline {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl CompletionPipeline {
    /// Start the completion thread with the standard resolver chain.
    pub fn start(
        engine: Arc<dyn ScriptEngine>,
        scope: ScopeHandle,
        surface: SurfaceHandle,
        config: &ConsoleConfig,
    ) -> Result<Self, ConsoleError> {
        let resolver: Arc<dyn MemberResolver> = Arc::new(ChainResolver::standard(Arc::clone(&engine)));
        Self::start_with_resolver(resolver, engine, scope, surface, config)
    }

    pub fn start_with_resolver(
        resolver: Arc<dyn MemberResolver>,
        engine: Arc<dyn ScriptEngine>,
        scope: ScopeHandle,
        surface: SurfaceHandle,
        config: &ConsoleConfig,
    ) -> Result<Self, ConsoleError> {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            requests: Mutex::new(tx),
            generation: AtomicU64::new(0),
            in_progress: Mutex::new(None),
            lookup: ArcSwap::from_pointee(DispatcherHandle::inline()),
            window: Arc::new(Mutex::new(None)),
        });
        let worker = Worker {
            shared: Arc::clone(&shared),
            resolver,
            engine,
            scope,
            surface,
            settings: Settings {
                exclude_callables: config.exclude_callables,
                description_delay: config.description_delay(),
            },
        };
        let thread = thread::Builder::new()
            .name("replkit-completion".into())
            .spawn(move || worker.run(rx))
            .map_err(|source| ConsoleError::Spawn {
                thread: "completion",
                source,
            })?;
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Queue a show request, superseding any that is still pending.
    pub fn show(&self, request: ShowRequest) {
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.send(Request::Show(generation, request));
    }

    /// (Re)start the description debounce for `request`.
    pub fn describe(&self, request: DescribeRequest) {
        self.shared.send(Request::Describe(request));
    }

    /// Drop a pending description request.
    pub fn cancel_describe(&self) {
        self.shared.send(Request::CancelDescribe);
    }

    /// Interrupt the running lookup and discard pending show results.
    ///
    /// Returns `false` when no lookup was running. Idempotent.
    pub fn stop(&self) -> bool {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        let Some(source) = self.shared.in_progress().take() else {
            return false;
        };
        source.cancel();
        tracing::debug!(target: "replkit.completion", "lookup interrupted");
        true
    }

    /// A lookup is running.
    pub fn is_busy(&self) -> bool {
        self.shared.in_progress().is_some()
    }

    /// Route engine lookups through `handle`.
    pub fn set_lookup_dispatcher(&self, handle: DispatcherHandle) {
        self.shared.lookup.store(Arc::new(handle));
    }

    pub fn window(&self) -> SharedWindow {
        Arc::clone(&self.shared.window)
    }
}

impl Drop for CompletionPipeline {
    fn drop(&mut self) {
        self.stop();
        self.shared.send(Request::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for CompletionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionPipeline")
            .field("busy", &self.is_busy())
            .finish()
    }
}

struct Worker {
    shared: Arc<Shared>,
    resolver: Arc<dyn MemberResolver>,
    engine: Arc<dyn ScriptEngine>,
    scope: ScopeHandle,
    surface: SurfaceHandle,
    settings: Settings,
}

impl Worker {
    fn run(self, rx: mpsc::Receiver<Request>) {
        let mut show: Option<(u64, ShowRequest)> = None;
        let mut describe: Option<(DescribeRequest, Instant)> = None;
        loop {
            let first = match &describe {
                Some((_, due)) => {
                    match rx.recv_timeout(due.saturating_duration_since(Instant::now())) {
                        Ok(request) => Some(request),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(request) => Some(request),
                    Err(_) => break,
                },
            };

            let mut shutdown = false;
            for request in first.into_iter().chain(std::iter::from_fn(|| rx.try_recv().ok())) {
                match request {
                    Request::Show(generation, req) => {
                        if show.replace((generation, req)).is_some() {
                            tracing::trace!(target: "replkit.completion", "show request superseded");
                        }
                    }
                    Request::Describe(req) => {
                        describe = Some((req, Instant::now() + self.settings.description_delay));
                    }
                    Request::CancelDescribe => describe = None,
                    Request::Shutdown => shutdown = true,
                }
            }
            if shutdown {
                break;
            }

            if let Some((generation, req)) = show.take() {
                self.show(generation, req);
            }
            let now = Instant::now();
            if let Some((req, _)) = describe.take_if(|(_, due)| now >= *due) {
                self.describe(req);
            }
        }
        tracing::debug!(target: "replkit.completion", "completion thread stopped");
    }

    /// Run `f` through the lookup dispatcher with a fresh cancellation token.
    fn lookup<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(CancellationToken) -> R + Send + 'static,
    {
        let source = CancellationSource::new();
        let token = source.token();
        *self.shared.in_progress() = Some(source);

        let (tx, rx) = mpsc::sync_channel(1);
        self.shared.lookup.load().submit(Box::new(move || {
            let _ = tx.send(f(token));
        }));
        let result = rx.recv().ok();

        self.shared.in_progress().take();
        result
    }

    fn show(&self, generation: u64, req: ShowRequest) {
        let prefix = split_completion_prefix(&req.text);
        if self.settings.exclude_callables && prefix.is_callable() {
            tracing::debug!(target: "replkit.completion", name = %prefix.name, "callable excluded");
            return;
        }
        let _span = tracing::debug_span!(
            target: "replkit.completion",
            "show",
            path = %prefix.object_path,
            member = %prefix.member_prefix
        )
        .entered();

        let resolver = Arc::clone(&self.resolver);
        let scope = self.scope.clone();
        let path = prefix.object_path.clone();
        let items = match self.lookup(move |token| resolver.resolve(&path, &scope, &token)) {
            Some(Ok(Some(items))) if !items.is_empty() => items,
            Some(Err(err)) => {
                tracing::debug!(target: "replkit.completion", error = %err, "member lookup failed");
                return;
            }
            _ => return,
        };

        if self.shared.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(target: "replkit.completion", "results discarded; request superseded");
            return;
        }

        let start_column = req
            .caret_column
            .saturating_sub(prefix.member_prefix.chars().count())
            .max(1);
        let window = CompletionWindow::new(items, prefix.member_prefix, req.line, start_column);
        let shared = Arc::clone(&self.shared);
        self.surface.post(move |surface| open_window(&shared, generation, window, surface));
    }

    fn describe(&self, req: DescribeRequest) {
        if req.item.is_empty() {
            return;
        }
        let _span = tracing::debug_span!(target: "replkit.completion", "describe", item = %req.item)
            .entered();
        let engine = Arc::clone(&self.engine);
        let scope = self.scope.clone();
        let query = req.clone();
        let description = match self.lookup(move |token| {
            let doc = DocQuery {
                owner: &query.stub,
                member: &query.item,
                on_type: query.is_instance,
            };
            engine.documentation(&doc, &scope, &token)
        }) {
            Some(Ok(doc)) => doc,
            Some(Err(err)) => {
                tracing::debug!(target: "replkit.completion", error = %err, "description lookup failed");
                None
            }
            None => None,
        };

        let window = Arc::clone(&self.shared.window);
        self.surface.post(move |surface| {
            let mut slot = lock_window(&window);
            let Some(open) = slot.as_mut() else {
                return;
            };
            let still_selected = open
                .selected()
                .is_some_and(|item| item.text == req.item && item.stub == req.stub);
            if !still_selected {
                return;
            }
            open.set_description(&req.item, description.clone());
            surface.show_description(description.as_deref());
        });
    }
}

fn open_window(
    shared: &Shared,
    generation: u64,
    window: CompletionWindow,
    surface: &mut dyn TextSurface,
) {
    if shared.generation.load(Ordering::Acquire) != generation {
        return;
    }
    let mut slot = lock_window(&shared.window);
    if slot.take().is_some() {
        surface.close_completions();
    }
    surface.show_completions(&window.labels(), window.selected_index());
    if let Some(item) = window.selected() {
        shared.send(Request::Describe(DescribeRequest {
            stub: item.stub.clone(),
            item: item.text.clone(),
            is_instance: item.is_instance,
        }));
    }
    *slot = Some(window);
}
