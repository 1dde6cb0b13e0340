//! QueueConnection and Queue handles.
//!
//! A `QueueConnection` owns one broker handle and a liveness name of the
//! form `{tag}-{6 random chars}`. Queues opened through the same connection
//! share its broker and its registry of attached consumers, which is what
//! keeps a queue to one active consumer per process.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::ports::{QueueBroker, QueueError};

use super::redis_broker::RedisBroker;

/// Suffix of the retry queue paired with every queue.
pub const RETRY_SUFFIX: &str = "::retry";

/// Suffix of the dead-letter queue used when retries run out.
pub const REJECTED_SUFFIX: &str = "::rejected";

type Attached = Arc<Mutex<HashSet<String>>>;

/// Shared connection to a queue broker.
#[derive(Clone)]
pub struct QueueConnection {
    name: String,
    broker: Arc<dyn QueueBroker>,
    attached: Attached,
}

impl QueueConnection {
    pub fn new(tag: &str, broker: Arc<dyn QueueBroker>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            name: format!("{}-{}", tag, &suffix[..6]),
            broker,
            attached: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Connect to Redis at `url`, namespacing every key under `tag`.
    pub async fn open_redis(tag: &str, url: &str) -> Result<Self, QueueError> {
        let broker = RedisBroker::connect(url, tag).await?;
        tracing::info!(%tag, "Connected to queue broker");
        Ok(Self::new(tag, Arc::new(broker)))
    }

    /// Liveness name of this connection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn broker(&self) -> Arc<dyn QueueBroker> {
        Arc::clone(&self.broker)
    }

    /// Handle to the queue called `name`. Opening the same name twice
    /// yields handles to the same underlying lists.
    pub fn open_queue(&self, name: impl Into<String>) -> Queue {
        Queue {
            name: name.into(),
            connection: self.clone(),
        }
    }

    /// Mark `queue` as consumed. Fails if a consumer already holds it.
    pub(crate) fn attach(&self, queue: &str) -> Result<Attachment, QueueError> {
        let mut attached = lock(&self.attached);
        if !attached.insert(queue.to_string()) {
            return Err(QueueError::AlreadyConsuming(queue.to_string()));
        }
        Ok(Attachment {
            queue: queue.to_string(),
            attached: Arc::clone(&self.attached),
        })
    }

    /// Whether a consumer is currently attached to `queue`.
    pub fn is_consuming(&self, queue: &str) -> bool {
        lock(&self.attached).contains(queue)
    }
}

impl std::fmt::Debug for QueueConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConnection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn lock(attached: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    attached
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registration of a consumer on a queue name. Released on drop.
#[derive(Debug)]
pub(crate) struct Attachment {
    queue: String,
    attached: Attached,
}

impl Drop for Attachment {
    fn drop(&mut self) {
        lock(&self.attached).remove(&self.queue);
    }
}

/// Named queue on a [`QueueConnection`].
#[derive(Debug, Clone)]
pub struct Queue {
    name: String,
    connection: QueueConnection,
}

impl Queue {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &QueueConnection {
        &self.connection
    }

    /// Name of the paired retry queue.
    pub fn retry_name(&self) -> String {
        format!("{}{}", self.name, RETRY_SUFFIX)
    }

    /// Name of the paired dead-letter queue.
    pub fn rejected_name(&self) -> String {
        format!("{}{}", self.name, REJECTED_SUFFIX)
    }

    /// Handle to the paired retry queue.
    pub fn retry_queue(&self) -> Queue {
        self.connection.open_queue(self.retry_name())
    }

    /// Name the unacked list of this connection's consumer is kept under.
    pub(crate) fn consumer_name(&self) -> String {
        self.connection.name.clone()
    }

    pub async fn publish(&self, payload: &str) -> Result<(), QueueError> {
        self.connection.broker.publish(&self.name, payload).await
    }

    /// Serialize `value` as JSON and publish it.
    pub async fn publish_json<T: Serialize>(&self, value: &T) -> Result<(), QueueError> {
        let payload =
            serde_json::to_string(value).map_err(|e| QueueError::Serialization(e.to_string()))?;
        self.publish(&payload).await
    }

    /// Items waiting to be fetched.
    pub async fn ready_count(&self) -> Result<usize, QueueError> {
        self.connection.broker.ready_count(&self.name).await
    }

    /// Items fetched by this connection's consumer and not yet settled.
    pub async fn unacked_count(&self) -> Result<usize, QueueError> {
        self.connection
            .broker
            .unacked_count(&self.name, &self.connection.name)
            .await
    }
}
