use crate::executor::{complete, Unfolder};
use crate::RunError;
use flowcore::{
    EventBus, EventEmitter, ExecutionId, FlowDefinition, FlowEvent, InterruptionReason,
    RunOutcome, UserStory,
};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, Span};

/// Hosts flow runs: publishes their events and lets callers bound or cancel them.
pub struct FlowRuntime {
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<FlowEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Run `flow` from `initial` to its completion result.
    pub async fn execute<F: FlowDefinition>(
        &self,
        flow: &F,
        initial: F::Story,
    ) -> Result<F::Output, InterruptionReason> {
        observe(flow, initial, self.emitter()).await
    }

    /// Run `flow` from `initial`, giving up once `deadline` has passed.
    ///
    /// On expiry the in-flight step is dropped and no further steps start.
    pub async fn execute_with_deadline<F: FlowDefinition>(
        &self,
        flow: &F,
        initial: F::Story,
        deadline: Duration,
    ) -> Result<F::Output, RunError> {
        run_until(flow, initial, self.emitter(), async move {
            tokio::time::sleep(deadline).await;
            RunError::DeadlineElapsed(deadline)
        })
        .await
    }

    /// Drive independent runs of `flow` concurrently. Results keep the order
    /// of `initials`.
    pub async fn execute_all<F, I>(
        &self,
        flow: &F,
        initials: I,
    ) -> Vec<Result<F::Output, InterruptionReason>>
    where
        F: FlowDefinition,
        I: IntoIterator<Item = F::Story>,
    {
        futures::future::join_all(initials.into_iter().map(|initial| self.execute(flow, initial))).await
    }

    /// Run `flow` on its own task. The configured default deadline applies.
    ///
    /// Dropping the handle detaches the run; call [`FlowHandle::cancel`] to
    /// abandon it.
    pub fn spawn<F>(&self, flow: Arc<F>, initial: F::Story) -> FlowHandle<F::Output>
    where
        F: FlowDefinition + 'static,
        F::Story: 'static,
        F::Output: 'static,
    {
        let emitter = self.emitter();
        let execution_id = emitter.execution_id();
        let cancel = CancellationToken::new();
        let stop = stop_signal(cancel.clone(), self.config.default_deadline());

        let task = tokio::spawn(async move { run_until(flow.as_ref(), initial, emitter, stop).await });

        FlowHandle {
            execution_id,
            cancel,
            task,
        }
    }

    fn emitter(&self) -> EventEmitter {
        self.event_bus.create_emitter(ExecutionId::new_v4())
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a run started with [`FlowRuntime::spawn`].
pub struct FlowHandle<T> {
    execution_id: ExecutionId,
    cancel: CancellationToken,
    task: JoinHandle<Result<T, RunError>>,
}

impl<T> FlowHandle<T> {
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Abandon the run. A step already in flight is dropped and its result
    /// discarded; the run then reports [`RunError::Abandoned`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run's single outcome.
    pub async fn join(self) -> Result<T, RunError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(RunError::Abandoned),
        }
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the execution event channel.
    pub event_buffer_size: usize,
    /// Deadline applied to spawned runs, in milliseconds.
    pub default_deadline_ms: Option<u64>,
}

impl RuntimeConfig {
    pub fn default_deadline(&self) -> Option<Duration> {
        self.default_deadline_ms.map(Duration::from_millis)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            default_deadline_ms: None,
        }
    }
}

/// Book-keeping shared by every observed run: start/finish events and logs.
///
/// The finish is reported on drop, so a run whose future is dropped before it
/// settles still ends with a `FlowFinished` event, as `Abandoned`.
struct ObservedRun {
    unfolder: Unfolder,
    events: EventEmitter,
    span: Span,
    started: Instant,
    outcome: Option<RunOutcome>,
}

impl ObservedRun {
    fn begin<F: FlowDefinition>(flow: &F, initial: &F::Story, events: EventEmitter) -> Self {
        tracing::info!(entry_step = initial.name(), "flow started");
        events.flow_started(flow.name(), initial.name());

        Self {
            unfolder: Unfolder::observed(events.clone()),
            events,
            span: Span::current(),
            started: Instant::now(),
            outcome: None,
        }
    }

    async fn drive<F: FlowDefinition>(
        &self,
        flow: &F,
        initial: F::Story,
    ) -> Result<F::Output, InterruptionReason> {
        let terminal = self.unfolder.unfold(initial).await?;
        complete(terminal, |terminal| flow.try_map(terminal))
    }

    fn finish(&mut self, outcome: RunOutcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for ObservedRun {
    fn drop(&mut self) {
        let _entered = self.span.enter();
        let outcome = self.outcome.take().unwrap_or(RunOutcome::Abandoned);
        let duration_ms = self.started.elapsed().as_millis() as u64;
        let steps = self.unfolder.steps_started();

        if outcome.is_success() {
            tracing::info!(steps, duration_ms, "flow completed");
        } else {
            tracing::warn!(?outcome, steps, duration_ms, "flow interrupted");
        }
        self.events.flow_finished(outcome, steps, duration_ms);
    }
}

/// Drive an observed run to its completion result.
#[instrument(
    name = "flow_run",
    skip_all,
    fields(execution_id = %events.execution_id(), flow = flow.name())
)]
async fn observe<F: FlowDefinition>(
    flow: &F,
    initial: F::Story,
    events: EventEmitter,
) -> Result<F::Output, InterruptionReason> {
    let mut run = ObservedRun::begin(flow, &initial, events);
    let result = run.drive(flow, initial).await;

    run.finish(match &result {
        Ok(_) => RunOutcome::Completed,
        Err(reason) => reason.outcome(),
    });
    result
}

/// Drive an observed run until it ends or `stop` resolves first.
#[instrument(
    name = "flow_run",
    skip_all,
    fields(execution_id = %events.execution_id(), flow = flow.name())
)]
async fn run_until<F, S>(
    flow: &F,
    initial: F::Story,
    events: EventEmitter,
    stop: S,
) -> Result<F::Output, RunError>
where
    F: FlowDefinition,
    S: Future<Output = RunError>,
{
    let mut run = ObservedRun::begin(flow, &initial, events);

    let result = tokio::select! {
        biased;
        halt = stop => Err(halt),
        result = run.drive(flow, initial) => result.map_err(RunError::from),
    };

    run.finish(match &result {
        Ok(_) => RunOutcome::Completed,
        Err(e) => e.outcome(),
    });
    result
}

async fn stop_signal(cancel: CancellationToken, deadline: Option<Duration>) -> RunError {
    match deadline {
        Some(deadline) => tokio::select! {
            _ = cancel.cancelled() => RunError::Abandoned,
            _ = tokio::time::sleep(deadline) => RunError::DeadlineElapsed(deadline),
        },
        None => {
            cancel.cancelled().await;
            RunError::Abandoned
        }
    }
}
