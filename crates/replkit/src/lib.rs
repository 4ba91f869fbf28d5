#![forbid(unsafe_code)]

//! replkit public facade crate.
//!
//! Re-exports the types a host needs to embed a console and offers a
//! prelude for day-to-day use. The building blocks live in
//! [`replkit_core`]; threads and coordination in [`replkit_runtime`].

pub mod error;

// --- Core re-exports -------------------------------------------------------

pub use replkit_core::{
    CommandHistory, EditContext, Key, MemorySurface, Position, Selection, Style, TextSurface,
};

// --- Runtime re-exports ----------------------------------------------------

pub use replkit_runtime::{
    CancellationSource, CancellationToken, CompileOutcome, CompiledUnit, Console, ConsoleConfig,
    ConsoleContext, Diagnostic, DispatcherHandle, DocQuery, ExecutionFault, KeyOutcome,
    LookupError, NativeMethod, NativeType, OutputStream, ReplHost, ReplStats, ScopeHandle,
    ScriptEngine, SourceKind, SurfaceDispatcher, SurfaceHandle, SurfaceThread,
};

// --- Errors ---------------------------------------------------------------

pub use error::{DegradationAction, Error, Result};

/// Everything needed to embed a console and implement an engine.
pub mod prelude {
    pub use crate::{
        CancellationToken, CompileOutcome, CompiledUnit, Console, ConsoleConfig, ConsoleContext,
        Diagnostic, DispatcherHandle, DocQuery, Error, ExecutionFault, Key, KeyOutcome,
        LookupError, ReplHost, Result, ScopeHandle, ScriptEngine, SourceKind, Style,
        SurfaceHandle, SurfaceThread, TextSurface,
    };

    pub use crate::{core, runtime};
}

pub use replkit_core as core;
pub use replkit_runtime as runtime;
