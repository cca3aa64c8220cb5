//! Scripted stories shared by the unit tests.

use async_trait::async_trait;
use flowcore::{BoxError, InterruptionReason, UserStory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
#[error("scripted failure: {0}")]
pub struct ScriptError(pub &'static str);

#[derive(Debug, Clone, Copy)]
pub enum Action {
    Advance,
    Finish,
    Fail(&'static str),
    Cancel,
    Hang,
}

/// A story that follows a fixed plan, one action per position.
#[derive(Clone)]
pub struct Script {
    pub position: usize,
    plan: Arc<Vec<Action>>,
    calls: Arc<AtomicUsize>,
}

impl Script {
    pub fn new(plan: Vec<Action>) -> Self {
        Self {
            position: 0,
            plan: Arc::new(plan),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `len` advancing steps followed by a finishing one.
    pub fn linear(len: usize) -> Self {
        let mut plan = vec![Action::Advance; len];
        plan.push(Action::Finish);
        Self::new(plan)
    }

    pub fn at(&self, position: usize) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStory for Script {
    async fn execute(&self) -> Result<Option<Self>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.plan.get(self.position).copied().unwrap_or(Action::Finish) {
            Action::Advance => Ok(Some(self.at(self.position + 1))),
            Action::Finish => Ok(None),
            Action::Fail(message) => Err(ScriptError(message).into()),
            Action::Cancel => Err(InterruptionReason::Canceled.into()),
            Action::Hang => {
                std::future::pending::<()>().await;
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        match self.plan.get(self.position) {
            Some(Action::Advance) => "advance",
            Some(Action::Fail(_)) => "fail",
            Some(Action::Cancel) => "cancel",
            Some(Action::Hang) => "hang",
            Some(Action::Finish) | None => "finish",
        }
    }
}
