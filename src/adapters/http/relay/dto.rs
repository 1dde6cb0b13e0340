//! Data transfer objects for relay HTTP endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::{Message, OutboundPayload, MESSAGE};

/// Message a bot backend wants delivered to a browser client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Registered client ID of the recipient
    #[serde(default)]
    pub to: String,
    /// Sender shown to the client
    #[serde(default)]
    pub from: String,
    /// Payload type, `message` when omitted
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub message: Message,
}

fn default_kind() -> String {
    MESSAGE.to_string()
}

impl From<SendMessageRequest> for OutboundPayload {
    fn from(request: SendMessageRequest) -> Self {
        Self {
            kind: request.kind,
            to: request.to,
            from: request.from,
            message: request.message,
        }
    }
}

/// Response to an accepted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub queued: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Registered websocket clients
    pub clients: usize,
}

/// Error body for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
