//! Callback forwarder adapters.
//!
//! - `HttpCallbackForwarder` - reqwest-backed webhook POST (production)
//! - `RecordingForwarder` - records calls in memory (tests)

mod http_forwarder;
mod mock;

pub use http_forwarder::HttpCallbackForwarder;
pub use mock::{ForwardedCall, RecordingForwarder};

use std::sync::Arc;

use crate::ports::{CallbackForwarder, ForwardError};

/// Forward in a detached task. Failures are logged and go nowhere else.
pub fn forward_detached(
    forwarder: Arc<dyn CallbackForwarder>,
    callback: String,
    from: String,
    text: String,
) {
    tokio::spawn(async move {
        if let Err(e) = forwarder.forward(&callback, &from, &text).await {
            match e {
                ForwardError::Status(status) => {
                    tracing::warn!(%callback, client_id = %from, status, "Callback rejected message");
                }
                other => {
                    tracing::error!(%callback, client_id = %from, error = %other, "Callback forwarding failed");
                }
            }
        }
    });
}
