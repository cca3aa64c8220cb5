use crate::BoxError;
use async_trait::async_trait;

/// One step of a flow.
///
/// A user story is an immutable value describing where the flow currently is
/// and the data it carries. Running it yields the next story, or `None` when
/// the chain ends at this story. A story must be sufficient on its own to
/// resume the flow from that point, so any story can be handed to the driver
/// as the initial step.
///
/// Side effects performed by `execute` must be safe to repeat: a caller may
/// restart a flow from a story that already ran once.
#[async_trait]
pub trait UserStory: Sized + Send + Sync {
    /// Run this story and produce the next one.
    async fn execute(&self) -> Result<Option<Self>, BoxError>;

    /// Label used in logs and execution events.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
