//! CallbackForwarder port - delivery of client messages to bot webhooks.
//!
//! A client registers a callback URL; messages it sends (and its
//! registration trigger) are POSTed there. Forwarding is best-effort:
//! callers log failures and never let them reach the session or the hub.

use async_trait::async_trait;

/// Errors that can occur while forwarding to a callback.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The registered callback is not a usable URL
    #[error("invalid callback url: {0}")]
    InvalidCallback(String),

    /// The webhook could not be reached
    #[error("callback request failed: {0}")]
    Network(String),

    /// The webhook answered with a non-success status
    #[error("callback responded with status {0}")]
    Status(u16),
}

/// Port for POSTing a message to a client's registered callback.
#[async_trait]
pub trait CallbackForwarder: Send + Sync {
    /// Send `text` on behalf of client `from` to `callback`.
    async fn forward(&self, callback: &str, from: &str, text: &str) -> Result<(), ForwardError>;
}
