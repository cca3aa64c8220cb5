//! Flow execution runtime
//!
//! This crate drives flows: the unfolding loop that executes one user story
//! after another until the chain ends, the completion mapping applied to the
//! terminal story, and a runtime that hosts observed, cancellable runs.

mod error;
mod executor;
mod runtime;
#[cfg(test)]
mod testing;

pub use error::RunError;
pub use executor::{execute_flow, execute_from, execute_to_end, unfold};
pub use runtime::{FlowHandle, FlowRuntime, RuntimeConfig};
