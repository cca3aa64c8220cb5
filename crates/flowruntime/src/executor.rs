use flowcore::{BoxError, EventEmitter, FlowDefinition, InterruptionReason, UserStory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Execute `initial` and every story it leads to, returning the terminal story.
///
/// Steps run strictly one after another. A step error that already is an
/// [`InterruptionReason`] is returned as is; any other error is wrapped in
/// [`InterruptionReason::Failed`]. Dropping the returned future stops the
/// chain: the in-flight step is dropped and no further step is started.
pub async fn unfold<S: UserStory>(initial: S) -> Result<S, InterruptionReason> {
    Unfolder::detached().unfold(initial).await
}

/// Run a flow from `initial` and map its terminal story with `try_map`.
///
/// `try_map` is called once, only when the chain ended without error. Its
/// errors are classified like step errors, so returning
/// `InterruptionReason::CompletedWithUnexpectedResult` surfaces unchanged.
pub async fn execute_from<S, T, E, F>(initial: S, try_map: F) -> Result<T, InterruptionReason>
where
    S: UserStory,
    F: FnOnce(S) -> Result<T, E>,
    E: Into<BoxError>,
{
    let terminal = unfold(initial).await?;
    complete(terminal, try_map)
}

/// Run a flow that has no completion result. Any terminal story is accepted.
pub async fn execute_to_end<S: UserStory>(initial: S) -> Result<(), InterruptionReason> {
    unfold(initial).await.map(|_| ())
}

/// Run a [`FlowDefinition`] from `initial`.
pub async fn execute_flow<F: FlowDefinition>(
    flow: &F,
    initial: F::Story,
) -> Result<F::Output, InterruptionReason> {
    execute_from(initial, |terminal| flow.try_map(terminal)).await
}

pub(crate) fn complete<S, T, E, F>(terminal: S, try_map: F) -> Result<T, InterruptionReason>
where
    F: FnOnce(S) -> Result<T, E>,
    E: Into<BoxError>,
{
    try_map(terminal).map_err(|error| InterruptionReason::classify(error.into()))
}

/// The unfolding loop, optionally reporting each step on an event emitter.
pub(crate) struct Unfolder {
    events: Option<EventEmitter>,
    started: AtomicUsize,
}

impl Unfolder {
    pub(crate) fn detached() -> Self {
        Self {
            events: None,
            started: AtomicUsize::new(0),
        }
    }

    pub(crate) fn observed(events: EventEmitter) -> Self {
        Self {
            events: Some(events),
            started: AtomicUsize::new(0),
        }
    }

    /// Number of step executions started so far, including one still in flight.
    pub(crate) fn steps_started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }

    pub(crate) async fn unfold<S: UserStory>(&self, initial: S) -> Result<S, InterruptionReason> {
        let mut current = initial;

        loop {
            let index = self.started.fetch_add(1, Ordering::Relaxed);
            let step_start = Instant::now();

            tracing::debug!(step = current.name(), index, "executing step");
            if let Some(events) = &self.events {
                events.step_started(current.name(), index);
            }

            match current.execute().await {
                Ok(Some(next)) => {
                    let duration_ms = step_start.elapsed().as_millis() as u64;
                    tracing::debug!(
                        step = current.name(),
                        next = next.name(),
                        duration_ms,
                        "step completed"
                    );
                    if let Some(events) = &self.events {
                        events.step_completed(current.name(), index, Some(next.name()), duration_ms);
                    }
                    current = next;
                }
                Ok(None) => {
                    let duration_ms = step_start.elapsed().as_millis() as u64;
                    tracing::debug!(step = current.name(), duration_ms, "chain ended");
                    if let Some(events) = &self.events {
                        events.step_completed(current.name(), index, None, duration_ms);
                    }
                    return Ok(current);
                }
                Err(error) => {
                    let reason = InterruptionReason::classify(error);
                    if reason.is_canceled() {
                        tracing::warn!(step = current.name(), index, "step canceled the flow");
                    } else {
                        tracing::error!(step = current.name(), index, error = %reason, "step failed");
                    }
                    if let Some(events) = &self.events {
                        events.step_failed(current.name(), index, &reason);
                    }
                    return Err(reason);
                }
            }
        }
    }
}
