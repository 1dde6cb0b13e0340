//! WebSocket upgrade handler for browser chat sessions.
//!
//! Handles the HTTP → WebSocket upgrade and hands the socket to
//! [`connection::serve`](super::connection::serve):
//! 1. Upgrade to WebSocket
//! 2. Create an unregistered client with its own outbound channel
//! 3. Serve frames until the peer leaves or breaks the protocol

use std::sync::Arc;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::config::RedirectConfig;
use crate::domain::ConnectionId;
use crate::ports::CallbackForwarder;

use super::{client::Client, connection, hub::HubHandle};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: HubHandle,
    pub forwarder: Arc<dyn CallbackForwarder>,
    pub redirects: RedirectConfig,
}

impl WebSocketState {
    pub fn new(
        hub: HubHandle,
        forwarder: Arc<dyn CallbackForwarder>,
        redirects: RedirectConfig,
    ) -> Self {
        Self {
            hub,
            forwarder,
            redirects,
        }
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let connection_id = ConnectionId::new();
    tracing::debug!(%connection_id, "WebSocket connected");

    let (sender, receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let client = Client::new(
        connection_id,
        outbound_tx,
        state.hub.downgrade(),
        state.forwarder,
        state.redirects,
    );

    connection::serve(sender, receiver, client, outbound_rx).await;
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::callback::RecordingForwarder;
    use crate::adapters::websocket::Hub;
    use crate::domain::{ClientId, InboundPayload};
    use axum::{body::Body, http::Request};
    use futures::SinkExt;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, tungstenite::Message};
    use tower::ServiceExt;

    fn state(forwarder: Arc<RecordingForwarder>, redirects: RedirectConfig) -> WebSocketState {
        WebSocketState::new(Hub::spawn(), forwarder, redirects)
    }

    async fn serve(state: WebSocketState) -> String {
        let app: axum::Router = websocket_router().with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{}/ws", addr)
    }

    async fn wait_for_count(hub: &HubHandle, expected: usize) {
        for _ in 0..100 {
            if hub.client_count().await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("hub never reached {} clients", expected);
    }

    fn frame(payload: &InboundPayload) -> Message {
        Message::Text(serde_json::to_string(payload).unwrap())
    }

    #[tokio::test]
    async fn plain_get_is_not_upgraded() {
        let app: axum::Router = websocket_router().with_state(state(
            Arc::new(RecordingForwarder::new()),
            RedirectConfig::default(),
        ));

        let response = app
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn registered_socket_joins_hub_and_leaves_on_close() {
        let forwarder = Arc::new(RecordingForwarder::new());
        let state = state(forwarder, RedirectConfig::default());
        let hub = state.hub.clone();
        let url = serve(state).await;

        let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
        socket
            .send(frame(&InboundPayload::register("u1", "http://cb")))
            .await
            .unwrap();
        wait_for_count(&hub, 1).await;
        assert!(hub
            .lookup(&ClientId::new("u1").unwrap())
            .await
            .unwrap()
            .is_some());

        socket.close(None).await.unwrap();
        wait_for_count(&hub, 0).await;
    }

    #[tokio::test]
    async fn message_is_mirrored_back_when_frontend_redirect_is_on() {
        let forwarder = Arc::new(RecordingForwarder::new());
        let state = state(forwarder.clone(), RedirectConfig::new(true, false));
        let hub = state.hub.clone();
        let url = serve(state).await;

        let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
        socket
            .send(frame(&InboundPayload::register("u1", "http://cb")))
            .await
            .unwrap();
        wait_for_count(&hub, 1).await;
        socket
            .send(frame(&InboundPayload::text("hello")))
            .await
            .unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = match reply {
            Message::Text(text) => text,
            other => panic!("expected a text frame, got {:?}", other),
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["to"], "u1");
        assert_eq!(json["message"]["text"], "hello");
        assert_eq!(forwarder.call_count(), 0);
    }

    #[tokio::test]
    async fn message_before_register_closes_the_socket() {
        let state = state(Arc::new(RecordingForwarder::new()), RedirectConfig::default());
        let url = serve(state).await;

        let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
        socket
            .send(frame(&InboundPayload::text("too early")))
            .await
            .unwrap();

        let next = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .unwrap();
        assert!(matches!(next, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
    }
}
