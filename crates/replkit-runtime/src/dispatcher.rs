#![forbid(unsafe_code)]

//! Cancellable command dispatcher.
//!
//! A unit of work (compile + execute of one statement) is handed to the
//! *dispatcher handle* currently installed, which decides where it runs: the
//! default [`WorkerThread`], the calling thread ([`DispatcherHandle::inline`])
//! or anything the host supplies. The REPL thread then waits for the unit in
//! bounded `poll_interval` increments until the unit completes or a keyboard
//! interrupt clears the `executing` flag.
//!
//! # State machine
//!
//! ```text
//!   Idle ──dispatch──▶ Dispatched ──job done──▶ Idle   (Completed)
//!                          │
//!                          └──interrupt──▶ Idle          (Interrupted)
//! ```
//!
//! An interrupt cancels the unit's [`CancellationToken`]; the unit itself
//! may keep running until its next safe point, but the REPL thread is
//! released immediately.
//!
//! Dispatches are serialised: a second caller (a `run_statements` thread, a
//! paste) waits until the unit in flight completes or is interrupted, so an
//! interrupt always reaches the unit that is actually running. A unit must
//! not dispatch on the thread that is already waiting in [`CommandDispatcher::dispatch`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwap;
use web_time::Instant;

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::error::ConsoleError;

/// A unit of work submitted to a dispatcher handle.
pub type Job = Box<dyn FnOnce() + Send>;

/// Where units of work run. Cheap to clone.
#[derive(Clone)]
pub struct DispatcherHandle {
    submit: Arc<dyn Fn(Job) + Send + Sync>,
    label: &'static str,
}

impl DispatcherHandle {
    pub fn new(submit: impl Fn(Job) + Send + Sync + 'static) -> Self {
        Self {
            submit: Arc::new(submit),
            label: "custom",
        }
    }

    /// Run every job on the calling thread.
    pub fn inline() -> Self {
        Self {
            submit: Arc::new(|job: Job| job()),
            label: "inline",
        }
    }

    /// Queue jobs on `worker`.
    pub fn from_worker(worker: &WorkerThread) -> Self {
        let sender = worker.sender.clone();
        Self {
            submit: Arc::new(move |job| {
                if sender.send(WorkerMsg::Run(job)).is_err() {
                    tracing::warn!(target: "replkit.dispatch", "worker thread gone; job dropped");
                }
            }),
            label: "worker",
        }
    }

    pub fn submit(&self, job: Job) {
        (self.submit)(job);
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DispatcherHandle").field(&self.label).finish()
    }
}

enum WorkerMsg {
    Run(Job),
    Shutdown,
}

/// A dedicated execution thread draining a job queue.
///
/// A panicking job is caught and logged; the thread keeps serving.
pub struct WorkerThread {
    sender: mpsc::Sender<WorkerMsg>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerThread {
    pub fn spawn(name: &str) -> Result<Self, ConsoleError> {
        let (tx, rx) = mpsc::channel::<WorkerMsg>();
        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || worker_loop(rx))
            .map_err(|source| ConsoleError::Spawn {
                thread: "execution",
                source,
            })?;
        Ok(Self {
            sender: tx,
            thread: Some(thread),
        })
    }

    /// Finish the jobs queued so far, then stop the thread.
    ///
    /// Jobs submitted afterwards through a [`DispatcherHandle`] are dropped.
    pub fn join(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.sender.send(WorkerMsg::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(rx: mpsc::Receiver<WorkerMsg>) {
    while let Ok(msg) = rx.recv() {
        let job = match msg {
            WorkerMsg::Run(job) => job,
            WorkerMsg::Shutdown => break,
        };
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(target: "replkit.dispatch", "job panicked; worker continues");
        }
    }
    tracing::debug!(target: "replkit.dispatch", "worker stopped");
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Dispatched,
}

#[derive(Debug, Default)]
struct Inflight {
    executing: bool,
    completed: bool,
    generation: u64,
    source: Option<CancellationSource>,
}

#[derive(Debug, Default)]
struct Shared {
    inflight: Mutex<Inflight>,
    done: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inflight> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Marks its generation complete when dropped, including on unwind.
struct CompletionGuard {
    shared: Arc<Shared>,
    generation: u64,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let mut inflight = self.shared.lock();
        if inflight.generation == self.generation {
            inflight.completed = true;
        }
        drop(inflight);
        self.shared.done.notify_all();
    }
}

/// Runs units of work through the installed handle and waits for them.
pub struct CommandDispatcher {
    handle: ArcSwap<DispatcherHandle>,
    shared: Arc<Shared>,
    serial: Mutex<()>,
    poll_interval: Duration,
}

impl CommandDispatcher {
    pub fn new(handle: DispatcherHandle, poll_interval: Duration) -> Self {
        Self {
            handle: ArcSwap::from_pointee(handle),
            shared: Arc::new(Shared::default()),
            serial: Mutex::new(()),
            poll_interval,
        }
    }

    /// Run `work` through the current handle and wait for it.
    ///
    /// Blocks first while another dispatch is in flight.
    pub fn dispatch<F>(&self, work: F) -> DispatchOutcome
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        self.begin().dispatch(work)
    }

    /// Take the dispatcher for a sequence of steps around one unit.
    ///
    /// Other callers of [`dispatch`](Self::dispatch) or `begin` wait until
    /// the returned turn is dropped.
    pub fn begin(&self) -> DispatchTurn<'_> {
        DispatchTurn {
            dispatcher: self,
            _serial: self.serial.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    fn run<F>(&self, work: F) -> DispatchOutcome
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        let (generation, token) = {
            let mut inflight = self.shared.lock();
            inflight.generation += 1;
            inflight.executing = true;
            inflight.completed = false;
            let source = CancellationSource::new();
            let token = source.token();
            inflight.source = Some(source);
            (inflight.generation, token)
        };

        let handle = self.handle.load_full();
        let _span = tracing::debug_span!(
            target: "replkit.dispatch",
            "dispatch",
            generation,
            handle = handle.label()
        )
        .entered();

        let guard = CompletionGuard {
            shared: Arc::clone(&self.shared),
            generation,
        };
        handle.submit(Box::new(move || {
            let _guard = guard;
            work(token);
        }));

        let start = Instant::now();
        let mut polls = 0_u32;
        let mut inflight = self.shared.lock();
        while inflight.executing && !inflight.completed {
            let (next, _) = self
                .shared
                .done
                .wait_timeout(inflight, self.poll_interval)
                .unwrap_or_else(|e| e.into_inner());
            inflight = next;
            polls += 1;
        }
        let outcome = if inflight.completed {
            DispatchOutcome::Completed
        } else {
            DispatchOutcome::Interrupted
        };
        inflight.executing = false;
        inflight.source = None;
        drop(inflight);

        tracing::debug!(
            target: "replkit.dispatch",
            ?outcome,
            polls,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dispatch finished"
        );
        outcome
    }

    /// Cancel the in-flight unit and release the waiter.
    ///
    /// Returns `false` (and does nothing) when idle.
    pub fn interrupt(&self) -> bool {
        let mut inflight = self.shared.lock();
        if !inflight.executing {
            return false;
        }
        inflight.executing = false;
        if let Some(source) = inflight.source.take() {
            source.cancel();
        }
        drop(inflight);
        self.shared.done.notify_all();
        tracing::info!(target: "replkit.dispatch", "keyboard interrupt");
        true
    }

    /// Install a new execution target; takes effect for the next dispatch.
    pub fn set_handle(&self, handle: DispatcherHandle) {
        tracing::debug!(target: "replkit.dispatch", handle = handle.label(), "handle replaced");
        self.handle.store(Arc::new(handle));
    }

    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle::clone(&self.handle.load())
    }

    pub fn is_executing(&self) -> bool {
        self.shared.lock().executing
    }

    pub fn state(&self) -> DispatchState {
        if self.is_executing() {
            DispatchState::Dispatched
        } else {
            DispatchState::Idle
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Exclusive use of a [`CommandDispatcher`], from [`CommandDispatcher::begin`].
pub struct DispatchTurn<'a> {
    dispatcher: &'a CommandDispatcher,
    _serial: MutexGuard<'a, ()>,
}

impl DispatchTurn<'_> {
    /// Run `work` through the current handle and wait for it.
    pub fn dispatch<F>(&self, work: F) -> DispatchOutcome
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        self.dispatcher.run(work)
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("handle", &self.handle.load().label())
            .field("state", &self.state())
            .finish()
    }
}
