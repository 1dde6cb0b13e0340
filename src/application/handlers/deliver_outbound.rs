//! OutboundDelivery - queue handler that hands outbound messages to the hub.

use async_trait::async_trait;

use crate::adapters::websocket::{HubError, HubHandle};
use crate::domain::{ClientId, OutboundPayload};
use crate::ports::{HandlerError, TaskHandler};

/// Name of the queue `POST /messages` publishes to.
pub const OUTBOUND_QUEUE: &str = "outgoing";

/// Delivers queued [`OutboundPayload`]s to the client named in `to`.
///
/// Fails when the payload cannot be decoded or the client is not connected,
/// which sends the item to the retry lane.
pub struct OutboundDelivery {
    hub: HubHandle,
}

impl OutboundDelivery {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl TaskHandler for OutboundDelivery {
    async fn handle(&self, payload: String) -> Result<(), HandlerError> {
        let outbound: OutboundPayload = serde_json::from_str(&payload)
            .map_err(|e| HandlerError::new(format!("undecodable outbound payload: {}", e)))?;

        let to = ClientId::new(outbound.to.as_str())
            .ok_or_else(|| HandlerError::new("outbound payload has no recipient"))?;

        tracing::trace!(client_id = %to, "Delivering queued message");

        self.hub
            .deliver(to, outbound)
            .await
            .map_err(|e: HubError| HandlerError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::{ClientEntry, Hub};
    use crate::domain::{ConnectionId, Message};
    use tokio::sync::mpsc;

    fn encoded(to: &str, text: &str) -> String {
        serde_json::to_string(&OutboundPayload::message(to, "bot", Message::text(text))).unwrap()
    }

    #[tokio::test]
    async fn delivers_to_registered_client() {
        let hub = Hub::spawn();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(ClientEntry {
            id: ClientId::new("u1").unwrap(),
            connection_id: ConnectionId::new(),
            outbound: tx,
        })
        .unwrap();
        let handler = OutboundDelivery::new(hub);

        handler.handle(encoded("u1", "hi there")).await.unwrap();

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.to, "u1");
        assert_eq!(delivered.from, "bot");
        assert_eq!(delivered.message.text, "hi there");
    }

    #[tokio::test]
    async fn offline_client_fails_the_item() {
        let handler = OutboundDelivery::new(Hub::spawn());

        let result = handler.handle(encoded("nobody", "hello")).await;

        assert!(result.unwrap_err().0.contains("nobody"));
    }

    #[tokio::test]
    async fn malformed_payload_fails_the_item() {
        let handler = OutboundDelivery::new(Hub::spawn());

        let result = handler.handle("not json".to_string()).await;

        assert!(result.unwrap_err().0.starts_with("undecodable"));
    }

    #[tokio::test]
    async fn payload_without_recipient_fails_the_item() {
        let handler = OutboundDelivery::new(Hub::spawn());

        let result = handler.handle(encoded("", "hello")).await;

        assert_eq!(
            result.unwrap_err(),
            HandlerError::new("outbound payload has no recipient")
        );
    }
}
