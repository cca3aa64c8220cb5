use crate::events::RunOutcome;
use thiserror::Error;

/// Opaque error raised by a step or a completion mapper.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a flow stopped without producing its completion result.
///
/// This is a closed set: every failure surfaced by a flow run is exactly one
/// of these variants.
#[derive(Error, Debug)]
pub enum InterruptionReason {
    /// Step logic deliberately aborted the flow (e.g. the user declined).
    #[error("flow canceled")]
    Canceled,

    /// An underlying operation failed. The original error is kept as the cause.
    #[error("flow failed: {0}")]
    Failed(#[source] BoxError),

    /// The chain terminated on a step the completion mapper does not accept.
    /// Points at a broken flow definition rather than a runtime fault.
    #[error("flow completed with unexpected result")]
    CompletedWithUnexpectedResult,
}

impl InterruptionReason {
    /// Normalize an arbitrary error into the taxonomy.
    ///
    /// An error that already is an `InterruptionReason` is returned unchanged,
    /// anything else is wrapped in `Failed`.
    pub fn classify(error: BoxError) -> Self {
        match error.downcast::<InterruptionReason>() {
            Ok(reason) => *reason,
            Err(cause) => InterruptionReason::Failed(cause),
        }
    }

    /// Wrap a concrete error as `Failed`, unless it is already a reason.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::classify(error.into())
    }

    /// Whether a step or mapper canceled the flow.
    pub fn is_canceled(&self) -> bool {
        matches!(self, InterruptionReason::Canceled)
    }

    /// Whether the flow stopped on a wrapped error.
    pub fn is_failed(&self) -> bool {
        matches!(self, InterruptionReason::Failed(_))
    }

    /// The wrapped cause of a `Failed` reason.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            InterruptionReason::Failed(cause) => Some(cause.as_ref()),
            _ => None,
        }
    }

    /// Downcast the cause of a `Failed` reason to a concrete error type.
    pub fn cause_as<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.cause().and_then(|cause| cause.downcast_ref::<E>())
    }

    /// Outcome label used when reporting this reason as an event.
    pub fn outcome(&self) -> RunOutcome {
        match self {
            InterruptionReason::Canceled => RunOutcome::Canceled,
            InterruptionReason::Failed(_) => RunOutcome::Failed,
            InterruptionReason::CompletedWithUnexpectedResult => {
                RunOutcome::CompletedWithUnexpectedResult
            }
        }
    }
}
