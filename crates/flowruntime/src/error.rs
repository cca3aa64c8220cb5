use flowcore::{InterruptionReason, RunOutcome};
use std::time::Duration;
use thiserror::Error;

/// Outcome of a run hosted by the runtime that did not complete.
///
/// Abandonment and deadlines are decided by the caller, so they live here
/// rather than in the flow's own `InterruptionReason` taxonomy.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Interrupted(#[from] InterruptionReason),

    #[error("flow run abandoned before it finished")]
    Abandoned,

    #[error("flow run exceeded its deadline of {}ms", .0.as_millis())]
    DeadlineElapsed(Duration),
}

impl RunError {
    pub fn outcome(&self) -> RunOutcome {
        match self {
            RunError::Interrupted(reason) => reason.outcome(),
            RunError::Abandoned => RunOutcome::Abandoned,
            RunError::DeadlineElapsed(_) => RunOutcome::DeadlineElapsed,
        }
    }

    pub fn interruption(&self) -> Option<&InterruptionReason> {
        match self {
            RunError::Interrupted(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn into_interruption(self) -> Option<InterruptionReason> {
        match self {
            RunError::Interrupted(reason) => Some(reason),
            _ => None,
        }
    }
}
