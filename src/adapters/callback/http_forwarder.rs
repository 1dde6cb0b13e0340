//! Webhook forwarder over HTTP.
//!
//! POSTs `from` and `text` as `application/x-www-form-urlencoded` to the
//! client's callback URL. No retries: a webhook that is down loses the
//! message, and the caller only logs the error.

use async_trait::async_trait;
use reqwest::Url;

use crate::ports::{CallbackForwarder, ForwardError};

/// `CallbackForwarder` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpCallbackForwarder {
    http_client: reqwest::Client,
}

impl HttpCallbackForwarder {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl CallbackForwarder for HttpCallbackForwarder {
    async fn forward(&self, callback: &str, from: &str, text: &str) -> Result<(), ForwardError> {
        let url = Url::parse(callback).map_err(|e| ForwardError::InvalidCallback(e.to_string()))?;

        tracing::trace!(%callback, %from, "Forwarding message to callback");

        let response = self
            .http_client
            .post(url)
            .form(&[("from", from), ("text", text)])
            .send()
            .await
            .map_err(|e| ForwardError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status.as_u16()));
        }

        Ok(())
    }
}
