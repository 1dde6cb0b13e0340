//! TaskHandler port - work performed on each queue item.

use std::future::Future;

use async_trait::async_trait;

/// Failure reported by a task handler.
///
/// The consumer only cares that the item failed; the message ends up in
/// the logs.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Handler invoked by a queue consumer for every delivered payload.
///
/// Delivery is at-least-once, so implementations must be idempotent.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: String) -> Result<(), HandlerError>;
}

/// Adapts an async closure into a [`TaskHandler`].
pub struct FnHandler<F>(F);

/// Wrap an async closure as a task handler.
///
/// ```ignore
/// let handler = handler_fn(|payload: String| async move {
///     tracing::info!(%payload, "got work");
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, payload: String) -> Result<(), HandlerError> {
        (self.0)(payload).await
    }
}
