//! Wire payloads exchanged with browser clients.
//!
//! - Client → Server: [`InboundPayload`] (`register` or `message`)
//! - Server → Client: [`OutboundPayload`]
//!
//! Both carry a [`Message`], a superset record covering text, media and
//! location variants. Every field besides `type` is optional on the wire.

use serde::{Deserialize, Serialize};

/// Inbound `type` value that registers the client.
pub const REGISTER: &str = "register";

/// Inbound `type` value that carries a chat message.
pub const MESSAGE: &str = "message";

/// A frame decoded from a browser client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundPayload {
    /// Empty when the frame has no `type`; such frames are ignored.
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub callback: String,

    /// Text that starts a flow on the callback as soon as the client registers.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trigger: String,

    #[serde(default)]
    pub message: Message,
}

impl InboundPayload {
    /// Build a `register` payload.
    pub fn register(from: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            kind: REGISTER.to_string(),
            from: from.into(),
            callback: callback.into(),
            ..Default::default()
        }
    }

    /// Build a `message` payload carrying plain text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: MESSAGE.to_string(),
            message: Message::text(text),
            ..Default::default()
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }
}

/// A frame encoded for a browser client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPayload {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub to: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,

    #[serde(default)]
    pub message: Message,
}

impl OutboundPayload {
    /// Build a `message` payload addressed to `to`.
    pub fn message(to: impl Into<String>, from: impl Into<String>, message: Message) -> Self {
        Self {
            kind: MESSAGE.to_string(),
            to: to.into(),
            from: from.into(),
            message,
        }
    }
}

/// Chat message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caption: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub latitude: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub longitude: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
            ..Default::default()
        }
    }
}
