use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// How a flow run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Canceled,
    Failed,
    CompletedWithUnexpectedResult,
    /// The caller cancelled the run before it finished.
    Abandoned,
    /// The caller's deadline expired before the run finished.
    DeadlineElapsed,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Events emitted while a flow unfolds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlowEvent {
    FlowStarted {
        execution_id: ExecutionId,
        flow: String,
        entry_step: String,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        execution_id: ExecutionId,
        step: String,
        index: usize,
        timestamp: DateTime<Utc>,
    },
    StepCompleted {
        execution_id: ExecutionId,
        step: String,
        index: usize,
        /// `None` when this step ended the chain.
        next_step: Option<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepFailed {
        execution_id: ExecutionId,
        step: String,
        index: usize,
        error: String,
        timestamp: DateTime<Utc>,
    },
    FlowFinished {
        execution_id: ExecutionId,
        outcome: RunOutcome,
        steps_executed: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl FlowEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            FlowEvent::FlowStarted { execution_id, .. }
            | FlowEvent::StepStarted { execution_id, .. }
            | FlowEvent::StepCompleted { execution_id, .. }
            | FlowEvent::StepFailed { execution_id, .. }
            | FlowEvent::FlowFinished { execution_id, .. } => *execution_id,
        }
    }
}

/// Event emitter bound to a single flow run
#[derive(Clone)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    sender: broadcast::Sender<FlowEvent>,
}

impl EventEmitter {
    pub fn new(execution_id: ExecutionId, sender: broadcast::Sender<FlowEvent>) -> Self {
        Self {
            execution_id,
            sender,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    fn emit(&self, event: FlowEvent) {
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn flow_started(&self, flow: &str, entry_step: &str) {
        self.emit(FlowEvent::FlowStarted {
            execution_id: self.execution_id,
            flow: flow.to_string(),
            entry_step: entry_step.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_started(&self, step: &str, index: usize) {
        self.emit(FlowEvent::StepStarted {
            execution_id: self.execution_id,
            step: step.to_string(),
            index,
            timestamp: Utc::now(),
        });
    }

    pub fn step_completed(&self, step: &str, index: usize, next_step: Option<&str>, duration_ms: u64) {
        self.emit(FlowEvent::StepCompleted {
            execution_id: self.execution_id,
            step: step.to_string(),
            index,
            next_step: next_step.map(str::to_string),
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn step_failed(&self, step: &str, index: usize, error: impl ToString) {
        self.emit(FlowEvent::StepFailed {
            execution_id: self.execution_id,
            step: step.to_string(),
            index,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn flow_finished(&self, outcome: RunOutcome, steps_executed: usize, duration_ms: u64) {
        self.emit(FlowEvent::FlowFinished {
            execution_id: self.execution_id,
            outcome,
            steps_executed,
            duration_ms,
            timestamp: Utc::now(),
        });
    }
}

/// Global event bus
pub struct EventBus {
    sender: broadcast::Sender<FlowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.sender.subscribe()
    }

    pub fn create_emitter(&self, execution_id: ExecutionId) -> EventEmitter {
        EventEmitter::new(execution_id, self.sender.clone())
    }
}
