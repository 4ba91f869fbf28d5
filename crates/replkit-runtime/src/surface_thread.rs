#![forbid(unsafe_code)]

//! Surface-thread affinity.
//!
//! All mutation of the text surface happens on one thread. Code running
//! elsewhere (the output writer, the completion pipeline, `run_statements`)
//! marshals work onto that thread as a [`SurfaceJob`].
//!
//! Hosts that already own a UI loop implement [`SurfaceDispatcher`] to feed
//! jobs into it. Headless hosts and tests use [`SurfaceThread`], which owns a
//! surface on a dedicated thread and enforces the one-writer rule by
//! construction: it is the only place the surface is touched.
//!
//! # Ordering
//!
//! Jobs run in the order they were posted. A job posted from inside another
//! job runs after the current one returns.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use replkit_core::TextSurface;

use crate::error::ConsoleError;

/// A unit of surface work.
pub type SurfaceJob = Box<dyn FnOnce(&mut dyn TextSurface) + Send>;

/// Something that can run jobs on the surface thread.
pub trait SurfaceDispatcher: Send + Sync {
    /// Queue `job`; never blocks on the job itself.
    fn post(&self, job: SurfaceJob);

    /// Whether the caller is already on the surface thread.
    fn is_surface_thread(&self) -> bool;
}

/// Cloneable access to a [`SurfaceDispatcher`].
#[derive(Clone)]
pub struct SurfaceHandle {
    dispatcher: Arc<dyn SurfaceDispatcher>,
}

impl SurfaceHandle {
    pub fn new(dispatcher: Arc<dyn SurfaceDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn post(&self, job: impl FnOnce(&mut dyn TextSurface) + Send + 'static) {
        self.dispatcher.post(Box::new(job));
    }

    /// Run `f` on the surface thread and wait for its result.
    ///
    /// Returns `None` if the surface thread is gone or if called from the
    /// surface thread itself (which would deadlock).
    pub fn invoke<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn TextSurface) -> R + Send + 'static,
    {
        if self.dispatcher.is_surface_thread() {
            tracing::warn!(target: "replkit.surface", "invoke called on the surface thread");
            return None;
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.dispatcher.post(Box::new(move |surface| {
            let _ = tx.send(f(surface));
        }));
        rx.recv().ok()
    }

    pub fn is_surface_thread(&self) -> bool {
        self.dispatcher.is_surface_thread()
    }
}

impl std::fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SurfaceHandle(..)")
    }
}

enum SurfaceMsg {
    Run(SurfaceJob),
    Shutdown,
}

struct ChannelDispatcher {
    sender: Mutex<mpsc::Sender<SurfaceMsg>>,
    thread_id: ThreadId,
}

impl SurfaceDispatcher for ChannelDispatcher {
    fn post(&self, job: SurfaceJob) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        if sender.send(SurfaceMsg::Run(job)).is_err() {
            tracing::debug!(target: "replkit.surface", "surface thread gone; job dropped");
        }
    }

    fn is_surface_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

/// A dedicated thread owning a surface.
pub struct SurfaceThread<S: TextSurface + 'static> {
    handle: SurfaceHandle,
    sender: mpsc::Sender<SurfaceMsg>,
    thread: Option<JoinHandle<S>>,
}

impl<S: TextSurface + 'static> SurfaceThread<S> {
    pub fn start(surface: S) -> Result<Self, ConsoleError> {
        let (tx, rx) = mpsc::channel::<SurfaceMsg>();
        let thread = thread::Builder::new()
            .name("replkit-surface".into())
            .spawn(move || surface_loop(surface, rx))
            .map_err(|source| ConsoleError::Spawn {
                thread: "surface",
                source,
            })?;
        let dispatcher = ChannelDispatcher {
            sender: Mutex::new(tx.clone()),
            thread_id: thread.thread().id(),
        };
        Ok(Self {
            handle: SurfaceHandle::new(Arc::new(dispatcher)),
            sender: tx,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> SurfaceHandle {
        self.handle.clone()
    }

    /// Run `f` against the surface and wait for the result.
    pub fn with_surface<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn TextSurface) -> R + Send + 'static,
    {
        self.handle.invoke(f)
    }

    /// Stop the thread after all queued jobs and hand the surface back.
    pub fn shutdown(mut self) -> Option<S> {
        let _ = self.sender.send(SurfaceMsg::Shutdown);
        self.thread.take().and_then(|t| t.join().ok())
    }
}

impl<S: TextSurface + 'static> Drop for SurfaceThread<S> {
    fn drop(&mut self) {
        let _ = self.sender.send(SurfaceMsg::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn surface_loop<S: TextSurface>(mut surface: S, rx: mpsc::Receiver<SurfaceMsg>) -> S {
    while let Ok(msg) = rx.recv() {
        match msg {
            SurfaceMsg::Run(job) => job(&mut surface),
            SurfaceMsg::Shutdown => break,
        }
    }
    surface
}
