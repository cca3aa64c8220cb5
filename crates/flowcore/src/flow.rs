use crate::{BoxError, InterruptionReason, UserStory};
use std::marker::PhantomData;

/// Everything that determines one flow's semantics: the story type (which
/// also carries the per-step execution) and the mapping from a terminal story
/// to the flow's completion result.
pub trait FlowDefinition: Send + Sync {
    type Story: UserStory;
    type Output: Send;

    /// Name reported in logs and execution events.
    fn name(&self) -> &str;

    /// Convert the terminal story into the completion result.
    ///
    /// Called exactly once per run, and only after the chain ended without
    /// error. Reject terminal stories of the wrong shape with
    /// `InterruptionReason::CompletedWithUnexpectedResult`.
    fn try_map(&self, terminal: Self::Story) -> Result<Self::Output, BoxError>;
}

/// A flow with no meaningful output: any terminal story completes it with `()`.
pub struct RunToEnd<S> {
    name: String,
    _story: PhantomData<fn() -> S>,
}

impl<S> RunToEnd<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _story: PhantomData,
        }
    }
}

impl<S: UserStory> FlowDefinition for RunToEnd<S> {
    type Story = S;
    type Output = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn try_map(&self, _terminal: S) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A flow assembled from a story type and a mapping closure.
pub struct MappedFlow<S, F> {
    name: String,
    mapper: F,
    _story: PhantomData<fn() -> S>,
}

impl<S, F> MappedFlow<S, F> {
    pub fn new<T>(name: impl Into<String>, mapper: F) -> Self
    where
        S: UserStory,
        F: Fn(S) -> Result<T, InterruptionReason> + Send + Sync,
    {
        Self {
            name: name.into(),
            mapper,
            _story: PhantomData,
        }
    }
}

impl<S, T, F> FlowDefinition for MappedFlow<S, F>
where
    S: UserStory,
    T: Send,
    F: Fn(S) -> Result<T, InterruptionReason> + Send + Sync,
{
    type Story = S;
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn try_map(&self, terminal: S) -> Result<T, BoxError> {
        (self.mapper)(terminal).map_err(Into::into)
    }
}
