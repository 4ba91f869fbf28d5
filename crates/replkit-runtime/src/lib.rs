#![forbid(unsafe_code)]

//! replkit runtime
//!
//! Threads and coordination for an embedded line-oriented console.
//!
//! # Key Components
//!
//! - [`Console`] - the façade: keystrokes, `read_line`, output, interrupts
//! - [`LineBroker`] - blocking hand-off of entered lines to the REPL thread
//! - [`CommandDispatcher`] - cancellable execution through a swappable handle
//! - [`OutputWriter`] - coalesced, surface-affine output
//! - [`CompletionPipeline`] - background member completion and descriptions
//! - [`SurfaceThread`] - a dedicated thread owning a [`TextSurface`]
//! - [`ScriptEngine`] - the opaque scripting language boundary
//!
//! # Threads
//!
//! A console involves three actors: the surface thread (keystrokes, all
//! surface mutation), the execution thread (engine work, replaceable by the
//! host), and the completion thread. The REPL loop ([`host`]) runs on a
//! fourth thread and spends most of its time blocked in `read_line`.
//!
//! [`TextSurface`]: replkit_core::TextSurface

pub mod broker;
pub mod cancellation;
pub mod completion;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod host;
pub mod output;
pub mod surface_thread;

pub use broker::LineBroker;
pub use cancellation::{CancellationSource, CancellationToken, Interrupted};
pub use completion::{CompletionItem, CompletionPipeline, CompletionWindow};
pub use config::{ConfigError, ConsoleConfig};
pub use console::{Console, ConsoleContext, KeyOutcome, PromptState};
pub use dispatcher::{
    CommandDispatcher, DispatchOutcome, DispatchState, DispatchTurn, DispatcherHandle, Job,
    WorkerThread,
};
pub use engine::{
    CompileOutcome, CompiledUnit, Diagnostic, DocQuery, ExecutionFault, LookupError, NativeMethod,
    NativeType, ScopeHandle, ScriptEngine, SourceKind, Visibility,
};
pub use error::{ConsoleError, Result};
pub use host::{ReplHost, ReplStats};
pub use output::{OutputStream, OutputWriter};
pub use surface_thread::{SurfaceDispatcher, SurfaceHandle, SurfaceJob, SurfaceThread};
