//! Consumer - reliable at-least-once processing of a queue.
//!
//! A consumer binds one [`TaskHandler`] to a queue and its retry queue and
//! runs two polling cursors:
//!
//! | Cursor | Source | On failure | Default poll |
//! |--------|--------|------------|--------------|
//! | main   | `{name}` | move to `{name}::retry` (`{name}::rejected` when `max_retries` is 0) | 100ms |
//! | retry  | `{name}::retry` | back onto `{name}::retry`, or `{name}::rejected` once `max_retries` is spent | 60s |
//!
//! A cursor polls again immediately while it keeps finding work and sleeps
//! for its poll interval once the source is empty, a broker call fails, or
//! an item was put back on its own source (the retry backoff).
//!
//! ## Shutdown
//!
//! [`ConsumerHandle::stop`] signals both cursors through a watch channel.
//! Each finishes its current batch, then the handle returns whatever is
//! still unacked to the ready lists and releases the queue name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::QueueConfig;
use crate::ports::{QueueBroker, QueueError, TaskHandler};

use super::connection::{Attachment, Queue};

/// Prefetch and cadence of both cursors.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub prefetch_limit: usize,
    pub poll_interval: Duration,
    pub retry_prefetch_limit: usize,
    pub retry_poll_interval: Duration,
    /// Failed retry attempts before an item is dead-lettered. `None` retries
    /// forever; `Some(0)` dead-letters on the first failure without retrying.
    pub max_retries: Option<u32>,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for ConsumerSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            prefetch_limit: config.consumer_prefetch_limit,
            poll_interval: config.consumer_poll_duration(),
            retry_prefetch_limit: config.retry_prefetch_limit,
            retry_poll_interval: config.retry_poll_duration(),
            max_retries: config.max_retries,
        }
    }
}

impl ConsumerSettings {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_poll_interval(mut self, interval: Duration) -> Self {
        self.retry_poll_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Binds a handler to a queue and its retry queue.
#[derive(Debug, Clone)]
pub struct Consumer {
    queue: Queue,
    settings: ConsumerSettings,
}

impl Consumer {
    pub fn new(queue: Queue, settings: ConsumerSettings) -> Self {
        Self { queue, settings }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Cursor over the main queue. Failures go to the retry queue, or straight
    /// to the dead-letter queue when retries are disabled.
    pub fn main_cursor(&self, handler: Arc<dyn TaskHandler>) -> Cursor {
        let budget = match self.settings.max_retries {
            Some(0) => Some(self.retry_budget(0)),
            _ => None,
        };
        Cursor {
            broker: self.queue.connection().broker(),
            source: self.queue.name().to_string(),
            consumer: self.queue.consumer_name(),
            on_failure: self.queue.retry_name(),
            prefetch_limit: self.settings.prefetch_limit,
            poll_interval: self.settings.poll_interval,
            handler,
            budget,
        }
    }

    /// Cursor over the retry queue. Failures are re-enqueued there, or
    /// dead-lettered once the retry ceiling is reached.
    pub fn retry_cursor(&self, handler: Arc<dyn TaskHandler>) -> Cursor {
        let retry_name = self.queue.retry_name();
        Cursor {
            broker: self.queue.connection().broker(),
            source: retry_name.clone(),
            consumer: self.queue.consumer_name(),
            on_failure: retry_name,
            prefetch_limit: self.settings.retry_prefetch_limit,
            poll_interval: self.settings.retry_poll_interval,
            handler,
            budget: self
                .settings
                .max_retries
                .map(|max_retries| self.retry_budget(max_retries)),
        }
    }

    fn retry_budget(&self, max_retries: u32) -> RetryBudget {
        RetryBudget {
            max_retries,
            dead_letter: self.queue.rejected_name(),
            failures: HashMap::new(),
        }
    }

    /// Start both cursors in the background.
    ///
    /// Fails with [`QueueError::AlreadyConsuming`] if a consumer is already
    /// attached to this queue on the same connection.
    pub fn start_consuming(
        &self,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<ConsumerHandle, QueueError> {
        let connection = self.queue.connection();
        let main_attachment = connection.attach(self.queue.name())?;
        let retry_attachment = connection.attach(&self.queue.retry_name())?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let main = self.main_cursor(Arc::clone(&handler));
        let retry = self.retry_cursor(handler);
        let tasks = vec![
            tokio::spawn(main.run(shutdown_rx.clone())),
            tokio::spawn(retry.run(shutdown_rx)),
        ];

        tracing::info!(
            queue = %self.queue.name(),
            consumer = %self.queue.consumer_name(),
            "Consumer started"
        );

        Ok(ConsumerHandle {
            shutdown: shutdown_tx,
            tasks,
            queue: self.queue.clone(),
            _attachments: [main_attachment, retry_attachment],
        })
    }
}

/// Running consumer. Dropping it stops the cursors without returning
/// unacked items; prefer [`ConsumerHandle::stop`].
#[derive(Debug)]
pub struct ConsumerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    queue: Queue,
    _attachments: [Attachment; 2],
}

impl ConsumerHandle {
    /// Stop both cursors and hand unacked items back to their ready lists.
    ///
    /// Returns the number of items returned.
    pub async fn stop(self) -> Result<usize, QueueError> {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(queue = %self.queue.name(), error = %e, "Cursor task failed");
            }
        }

        let broker = self.queue.connection().broker();
        let consumer = self.queue.consumer_name();
        let mut returned = broker.return_unacked(self.queue.name(), &consumer).await?;
        returned += broker
            .return_unacked(&self.queue.retry_name(), &consumer)
            .await?;

        tracing::info!(queue = %self.queue.name(), returned, "Consumer stopped");
        Ok(returned)
    }
}

#[derive(Debug)]
struct RetryBudget {
    max_retries: u32,
    dead_letter: String,
    failures: HashMap<String, u32>,
}

impl RetryBudget {
    /// Record one more failure of `payload`; true once the ceiling is hit.
    fn exhausted(&mut self, payload: &str) -> bool {
        let failures = self.failures.entry(payload.to_string()).or_insert(0);
        *failures += 1;
        if *failures >= self.max_retries {
            self.failures.remove(payload);
            return true;
        }
        false
    }
}

/// What one poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub fetched: usize,
    pub acked: usize,
    /// Moved to the failure queue (retry lane)
    pub retried: usize,
    pub rejected: usize,
}

/// One polling loop over one source queue.
pub struct Cursor {
    broker: Arc<dyn QueueBroker>,
    source: String,
    consumer: String,
    on_failure: String,
    prefetch_limit: usize,
    poll_interval: Duration,
    handler: Arc<dyn TaskHandler>,
    budget: Option<RetryBudget>,
}

impl Cursor {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Poll until the shutdown flag is raised or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            let idle = match self.poll_once().await {
                Ok(outcome) => outcome.fetched == 0 || self.requeued_onto_source(&outcome),
                Err(e) => {
                    tracing::error!(queue = %self.source, error = %e, "Queue poll failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = time::sleep(self.poll_interval) => {}
                }
            }
        }

        tracing::debug!(queue = %self.source, "Cursor stopped");
    }

    /// Fetch up to the prefetch limit and settle every fetched item.
    ///
    /// Also useful in tests to drive a cursor without its loop.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, QueueError> {
        let payloads = self
            .broker
            .fetch(&self.source, &self.consumer, self.prefetch_limit)
            .await?;

        let mut outcome = PollOutcome {
            fetched: payloads.len(),
            ..PollOutcome::default()
        };

        for payload in payloads {
            if let Err(e) = self.settle(payload, &mut outcome).await {
                // Item stays unacked until the consumer is stopped
                tracing::error!(queue = %self.source, error = %e, "Failed to settle queue item");
            }
        }

        Ok(outcome)
    }

    async fn settle(&mut self, payload: String, outcome: &mut PollOutcome) -> Result<(), QueueError> {
        match self.handler.handle(payload.clone()).await {
            Ok(()) => {
                if let Some(budget) = self.budget.as_mut() {
                    budget.failures.remove(&payload);
                }
                self.broker.ack(&self.source, &self.consumer, &payload).await?;
                outcome.acked += 1;
            }
            Err(e) => {
                let dead_letter = match self.budget.as_mut() {
                    Some(budget) => budget
                        .exhausted(&payload)
                        .then(|| budget.dead_letter.clone()),
                    None => None,
                };

                match dead_letter {
                    Some(target) => {
                        tracing::error!(
                            queue = %self.source,
                            error = %e,
                            "Retries exhausted, moving item to dead-letter queue"
                        );
                        self.broker
                            .move_unacked(&self.source, &self.consumer, &payload, &target)
                            .await?;
                        outcome.rejected += 1;
                    }
                    None => {
                        tracing::warn!(
                            queue = %self.source,
                            retry_queue = %self.on_failure,
                            error = %e,
                            "Queue item failed, scheduling retry"
                        );
                        self.broker
                            .move_unacked(&self.source, &self.consumer, &payload, &self.on_failure)
                            .await?;
                        outcome.retried += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn requeued_onto_source(&self, outcome: &PollOutcome) -> bool {
        outcome.retried > 0 && self.on_failure == self.source
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("source", &self.source)
            .field("on_failure", &self.on_failure)
            .field("prefetch_limit", &self.prefetch_limit)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
