//! Core abstractions for the flow engine
//!
//! A flow is a chain of user stories: each story runs asynchronously and
//! hands back the story that follows it, or ends the chain. This crate holds
//! the contracts every flow implements, the closed set of interruption
//! reasons a run can end with, and the execution events runs publish. It
//! does not drive flows itself; see `flowruntime`.

mod error;
pub mod events;
mod flow;
mod story;

pub use error::{BoxError, InterruptionReason};
pub use events::*;
pub use flow::{FlowDefinition, MappedFlow, RunToEnd};
pub use story::UserStory;

/// Result type for flow runs
pub type Result<T> = std::result::Result<T, InterruptionReason>;
