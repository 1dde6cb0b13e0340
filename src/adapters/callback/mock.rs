//! Mock callback forwarder for testing.
//!
//! Records every forwarded message instead of calling a webhook, and can be
//! told to fail so tests can check that forwarding errors stay contained.
//!
//! # Example
//!
//! ```ignore
//! let forwarder = Arc::new(RecordingForwarder::new());
//!
//! // ... exercise a client that forwards in a detached task ...
//!
//! let calls = forwarder.wait_for_calls(1).await;
//! assert_eq!(calls[0].text, "hello");
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::ports::{CallbackForwarder, ForwardError};

/// One recorded call to [`CallbackForwarder::forward`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedCall {
    pub callback: String,
    pub from: String,
    pub text: String,
}

/// Forwarder that records calls in memory.
#[derive(Debug, Default)]
pub struct RecordingForwarder {
    calls: Mutex<Vec<ForwardedCall>>,
    notify: Notify,
    fail: bool,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A forwarder that records each call and then reports a network error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<ForwardedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Wait until at least `count` calls were recorded.
    ///
    /// Forwarding runs in detached tasks; callers should bound this with a
    /// timeout.
    pub async fn wait_for_calls(&self, count: usize) -> Vec<ForwardedCall> {
        loop {
            let calls = self.calls();
            if calls.len() >= count {
                return calls;
            }
            self.notify.notified().await;
        }
    }
}

#[async_trait]
impl CallbackForwarder for RecordingForwarder {
    async fn forward(&self, callback: &str, from: &str, text: &str) -> Result<(), ForwardError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(ForwardedCall {
                callback: callback.to_string(),
                from: from.to_string(),
                text: text.to_string(),
            });
        self.notify.notify_one();

        if self.fail {
            return Err(ForwardError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}
