//! QueueBroker port - storage behind the reliable work queue.
//!
//! Each named queue has one `ready` list shared by producers and, per
//! consumer, one `unacked` list holding the items that consumer has
//! fetched but not yet settled. An item leaves the unacked list only by
//! being acknowledged, moved to another queue, or returned to ready.

use async_trait::async_trait;

/// Errors that can occur in queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Broker communication error
    #[error("broker error: {0}")]
    Broker(String),

    /// A consumer is already attached to this queue in this process
    #[error("queue {0} already has an active consumer")]
    AlreadyConsuming(String),

    /// Payload could not be encoded for publishing
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Port for the broker holding queue items.
///
/// Implementations must make `fetch`, `ack` and `move_unacked` safe to call
/// concurrently from different consumers.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Append a payload to the ready list of `queue`.
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), QueueError>;

    /// Move ready items into `consumer`'s unacked list, oldest first, until
    /// the unacked list holds `limit` items or the ready list is empty.
    ///
    /// Returns only the newly moved payloads.
    async fn fetch(
        &self,
        queue: &str,
        consumer: &str,
        limit: usize,
    ) -> Result<Vec<String>, QueueError>;

    /// Remove one unacked occurrence of `payload`.
    async fn ack(&self, queue: &str, consumer: &str, payload: &str) -> Result<(), QueueError>;

    /// Atomically remove one unacked occurrence of `payload` and append it
    /// to the ready list of `target`.
    async fn move_unacked(
        &self,
        queue: &str,
        consumer: &str,
        payload: &str,
        target: &str,
    ) -> Result<(), QueueError>;

    /// Push every unacked item of `consumer` back onto the ready list.
    async fn return_unacked(&self, queue: &str, consumer: &str) -> Result<usize, QueueError>;

    /// Number of items waiting in the ready list.
    async fn ready_count(&self, queue: &str) -> Result<usize, QueueError>;

    /// Number of items `consumer` holds unacknowledged.
    async fn unacked_count(&self, queue: &str, consumer: &str) -> Result<usize, QueueError>;
}
