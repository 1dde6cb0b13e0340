//! Work queue configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Work queue configuration (Redis-backed broker)
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Namespace prefix for every key the queue touches
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Redis connection URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Max unacknowledged items held from the main queue
    #[serde(default = "default_prefetch_limit")]
    pub consumer_prefetch_limit: usize,

    /// Main queue poll interval in milliseconds, used when the queue is empty
    #[serde(default = "default_consumer_poll_ms")]
    pub consumer_poll_duration_ms: u64,

    /// Max unacknowledged items held from the retry queue
    #[serde(default = "default_prefetch_limit")]
    pub retry_prefetch_limit: usize,

    /// Retry queue poll interval in milliseconds
    #[serde(default = "default_retry_poll_ms")]
    pub retry_poll_duration_ms: u64,

    /// Failed retry attempts before an item is dead-lettered.
    /// `None` retries forever; `0` disables the retry lane.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl QueueConfig {
    pub fn consumer_poll_duration(&self) -> Duration {
        Duration::from_millis(self.consumer_poll_duration_ms)
    }

    pub fn retry_poll_duration(&self) -> Duration {
        Duration::from_millis(self.retry_poll_duration_ms)
    }

    /// Validate queue configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tag.trim().is_empty() {
            return Err(ValidationError::MissingRequired("QUEUE__TAG"));
        }
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("QUEUE__URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.consumer_prefetch_limit == 0 {
            return Err(ValidationError::InvalidPrefetchLimit("consumer_prefetch_limit"));
        }
        if self.retry_prefetch_limit == 0 {
            return Err(ValidationError::InvalidPrefetchLimit("retry_prefetch_limit"));
        }
        if self.consumer_poll_duration_ms == 0 {
            return Err(ValidationError::InvalidPollDuration("consumer_poll_duration_ms"));
        }
        if self.retry_poll_duration_ms == 0 {
            return Err(ValidationError::InvalidPollDuration("retry_poll_duration_ms"));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            url: default_url(),
            consumer_prefetch_limit: default_prefetch_limit(),
            consumer_poll_duration_ms: default_consumer_poll_ms(),
            retry_prefetch_limit: default_prefetch_limit(),
            retry_poll_duration_ms: default_retry_poll_ms(),
            max_retries: None,
        }
    }
}

fn default_tag() -> String {
    "wwcs-service".to_string()
}

fn default_url() -> String {
    "redis://localhost:6379/1".to_string()
}

fn default_prefetch_limit() -> usize {
    1000
}

fn default_consumer_poll_ms() -> u64 {
    100
}

fn default_retry_poll_ms() -> u64 {
    60_000
}
