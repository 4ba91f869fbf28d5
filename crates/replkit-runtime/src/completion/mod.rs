#![forbid(unsafe_code)]

//! Member completion.
//!
//! - [`item`]: candidates and the open-window state
//! - [`resolver`]: native and engine member listing strategies
//! - [`pipeline`]: the background worker tying them to the surface

pub mod item;
pub mod pipeline;
pub mod resolver;

pub use item::{CompletionItem, CompletionWindow};
pub use pipeline::{CompletionPipeline, DescribeRequest, SharedWindow, ShowRequest, lock_window};
pub use resolver::{
    ChainResolver, EngineIntrospection, MemberResolver, NativeIntrospection, native_member_names,
    order_engine_members,
};
