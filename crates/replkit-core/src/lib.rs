#![forbid(unsafe_code)]

//! replkit core
//!
//! Thread-free building blocks for an embedded line-oriented console.
//!
//! # Key Components
//!
//! - [`Position`] / [`Selection`] - 1-based caret geometry on a text surface
//! - [`EditContext`] - read-only region policy (which offsets are editable)
//! - [`CommandHistory`] - append-only command log with a navigation cursor
//! - [`scanner`] - delimiter scanning that isolates a completion prefix
//! - [`TextSurface`] - the editable text area the console writes into
//! - [`MemorySurface`] - rope-backed in-memory surface
//!
//! # Role in replkit
//! `replkit-core` never spawns threads or blocks. The runtime crate layers
//! the surface thread, line broker, dispatcher, and completion pipeline on
//! top of these types.

pub mod geometry;
pub mod history;
pub mod key;
pub mod region;
pub mod scanner;
pub mod style;
pub mod surface;

pub use geometry::{Position, Selection};
pub use history::CommandHistory;
pub use key::Key;
pub use region::EditContext;
pub use scanner::{CompletionPrefix, split_completion_prefix};
pub use style::Style;
pub use surface::{MemorySurface, TextSurface};
