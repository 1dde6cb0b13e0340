//! Connection lifecycle for one browser socket.
//!
//! [`serve`] runs for the lifetime of the session:
//! 1. Spawn a writer that drains the client's outbound channel into the socket
//! 2. Read frames, decode them and hand them to the client, in order
//! 3. On exit, unregister the client from the hub and close the socket,
//!    once each, however the read loop ended

use std::fmt::Display;

use axum::extract::ws::{close_code, Message as Frame};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};

use crate::domain::{ConnectionId, InboundPayload, OutboundPayload, ProtocolError};

use super::client::Client;

/// Why a session's read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed with "going away" (1001), e.g. the tab was closed
    GoingAway,
    /// Peer closed with any other code, or without one
    Closed(Option<u16>),
    /// The underlying stream ended without a close frame
    StreamEnded,
    /// Reading from the socket failed
    TransportError,
    /// A frame was not a valid payload
    DecodeError,
    /// The client broke the protocol
    Protocol(ProtocolError),
}

/// Drive one session until the peer leaves or the client errors out.
///
/// `outbound` must be the receiving half of the channel the client was
/// created with.
pub async fn serve<Si, St, E>(
    sink: Si,
    mut stream: St,
    mut client: Client,
    outbound: mpsc::UnboundedReceiver<OutboundPayload>,
) -> SessionEnd
where
    Si: Sink<Frame> + Unpin + Send + 'static,
    Si::Error: Display + Send,
    St: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let connection_id = client.connection_id();
    let (close_tx, close_rx) = oneshot::channel();
    let writer = tokio::spawn(write_loop(sink, outbound, close_rx, connection_id));

    let end = read_loop(&mut stream, &mut client).await;

    client.leave();
    let _ = close_tx.send(());
    if let Err(e) = writer.await {
        tracing::error!(%connection_id, error = %e, "Writer task failed");
    }

    tracing::debug!(%connection_id, ?end, "Session ended");
    end
}

async fn read_loop<St, E>(stream: &mut St, client: &mut Client) -> SessionEnd
where
    St: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let connection_id = client.connection_id();

    while let Some(frame) = stream.next().await {
        tracing::trace!(%connection_id, "Reading frame");

        let decoded = match frame {
            Ok(Frame::Text(text)) => serde_json::from_str::<InboundPayload>(&text),
            Ok(Frame::Binary(data)) => serde_json::from_slice::<InboundPayload>(&data),
            Ok(Frame::Ping(_)) | Ok(Frame::Pong(_)) => continue,
            Ok(Frame::Close(frame)) => {
                let code = frame.map(|f| f.code);
                if code == Some(close_code::AWAY) {
                    tracing::debug!(%connection_id, "Client going away");
                    return SessionEnd::GoingAway;
                }
                tracing::error!(%connection_id, ?code, "Client closed connection");
                return SessionEnd::Closed(code);
            }
            Err(e) => {
                tracing::error!(%connection_id, error = %e, "Receive error");
                return SessionEnd::TransportError;
            }
        };

        let payload = match decoded {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(%connection_id, error = %e, "Undecodable frame");
                return SessionEnd::DecodeError;
            }
        };

        if let Err(e) = client.dispatch(payload) {
            if e.is_fatal() {
                tracing::error!(%connection_id, error = %e, "Protocol error, closing session");
                return SessionEnd::Protocol(e);
            }
            tracing::warn!(%connection_id, error = %e, "Message dropped");
        }
    }

    SessionEnd::StreamEnded
}

async fn write_loop<Si>(
    mut sink: Si,
    mut outbound: mpsc::UnboundedReceiver<OutboundPayload>,
    mut close: oneshot::Receiver<()>,
    connection_id: ConnectionId,
) where
    Si: Sink<Frame> + Unpin + Send,
    Si::Error: Display + Send,
{
    loop {
        tokio::select! {
            biased;
            _ = &mut close => break,
            payload = outbound.recv() => {
                let Some(payload) = payload else { break };
                let text = match serde_json::to_string(&payload) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(%connection_id, error = %e, "Unencodable payload");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Frame::Text(text)).await {
                    tracing::debug!(%connection_id, error = %e, "Send error, closing connection");
                    break;
                }
            }
        }
    }

    // Dropping the receiver makes further hub writes fail, which the hub
    // treats as a disconnect.
    drop(outbound);
    if let Err(e) = sink.close().await {
        tracing::trace!(%connection_id, error = %e, "Close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::callback::RecordingForwarder;
    use crate::adapters::websocket::hub::{Hub, HubHandle};
    use crate::config::RedirectConfig;
    use crate::domain::ClientId;
    use axum::extract::ws::CloseFrame;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;

    /// Sink that records frames and counts close calls.
    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<Frame>>>,
        closes: Arc<AtomicUsize>,
    }

    impl RecordingSink {
        fn texts(&self) -> Vec<String> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .filter_map(|frame| match frame {
                    Frame::Text(text) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Sink<Frame> for RecordingSink {
        type Error = std::io::Error;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
            self.frames.lock().unwrap().push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    type Inbound = futures::channel::mpsc::UnboundedSender<Result<Frame, std::io::Error>>;

    struct Session {
        hub: HubHandle,
        sink: RecordingSink,
        inbound: Inbound,
        task: tokio::task::JoinHandle<SessionEnd>,
    }

    fn start_session(redirects: RedirectConfig) -> Session {
        let hub = Hub::spawn();
        let sink = RecordingSink::default();
        let (inbound, frames) = futures::channel::mpsc::unbounded();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let client = Client::new(
            ConnectionId::new(),
            outbound_tx,
            hub.downgrade(),
            Arc::new(RecordingForwarder::new()),
            redirects,
        );
        let task = tokio::spawn(serve(sink.clone(), frames, client, outbound_rx));
        Session {
            hub,
            sink,
            inbound,
            task,
        }
    }

    fn text(value: serde_json::Value) -> Result<Frame, std::io::Error> {
        Ok(Frame::Text(value.to_string()))
    }

    fn close(code: u16) -> Result<Frame, std::io::Error> {
        Ok(Frame::Close(Some(CloseFrame {
            code,
            reason: "".into(),
        })))
    }

    fn register_frame() -> Result<Frame, std::io::Error> {
        text(serde_json::json!({"type": "register", "from": "u1", "callback": "http://cb"}))
    }

    async fn finish(session: Session) -> (SessionEnd, HubHandle, RecordingSink) {
        let end = tokio::time::timeout(Duration::from_secs(1), session.task)
            .await
            .unwrap()
            .unwrap();
        (end, session.hub, session.sink)
    }

    async fn wait_registered(hub: &HubHandle) {
        let id = ClientId::new("u1").unwrap();
        for _ in 0..100 {
            if hub.lookup(&id).await.unwrap().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("client never registered");
    }

    #[tokio::test]
    async fn going_away_ends_session_and_cleans_up_once() {
        let session = start_session(RedirectConfig::default());
        session.inbound.unbounded_send(register_frame()).unwrap();
        wait_registered(&session.hub).await;

        session.inbound.unbounded_send(close(close_code::AWAY)).unwrap();
        let (end, hub, sink) = finish(session).await;

        assert_eq!(end, SessionEnd::GoingAway);
        assert_eq!(hub.client_count().await.unwrap(), 0);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_close_codes_are_reported() {
        let session = start_session(RedirectConfig::default());

        session.inbound.unbounded_send(close(close_code::PROTOCOL)).unwrap();
        let (end, _hub, sink) = finish(session).await;

        assert_eq!(end, SessionEnd::Closed(Some(close_code::PROTOCOL)));
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undecodable_frame_ends_session() {
        let session = start_session(RedirectConfig::default());
        session.inbound.unbounded_send(register_frame()).unwrap();
        wait_registered(&session.hub).await;

        session
            .inbound
            .unbounded_send(Ok(Frame::Text("{not json".to_string())))
            .unwrap();
        let (end, hub, sink) = finish(session).await;

        assert_eq!(end, SessionEnd::DecodeError);
        assert_eq!(hub.client_count().await.unwrap(), 0);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_error_ends_session() {
        let session = start_session(RedirectConfig::default());

        session
            .inbound
            .unbounded_send(Err(std::io::Error::other("connection reset")))
            .unwrap();
        let (end, _hub, sink) = finish(session).await;

        assert_eq!(end, SessionEnd::TransportError);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn message_before_register_is_fatal() {
        let session = start_session(RedirectConfig::new(true, false));

        session
            .inbound
            .unbounded_send(text(serde_json::json!({"type": "message", "message": {"text": "hi"}})))
            .unwrap();
        let (end, _hub, sink) = finish(session).await;

        assert_eq!(end, SessionEnd::Protocol(ProtocolError::NeedRegistration));
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_register_keeps_the_session_open() {
        let session = start_session(RedirectConfig::default());
        session
            .inbound
            .unbounded_send(text(serde_json::json!({"type": "register", "callback": "http://cb"})))
            .unwrap();
        session
            .inbound
            .unbounded_send(text(serde_json::json!({"type": "register", "from": "u1"})))
            .unwrap();
        session.inbound.unbounded_send(register_frame()).unwrap();

        wait_registered(&session.hub).await;
        assert!(!session.task.is_finished());

        session.inbound.unbounded_send(close(close_code::AWAY)).unwrap();
        let (end, hub, _sink) = finish(session).await;

        assert_eq!(end, SessionEnd::GoingAway);
        assert_eq!(hub.client_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn frame_without_type_is_ignored() {
        let session = start_session(RedirectConfig::default());
        session
            .inbound
            .unbounded_send(text(serde_json::json!({"from": "u1"})))
            .unwrap();
        session.inbound.unbounded_send(register_frame()).unwrap();

        wait_registered(&session.hub).await;
        assert!(!session.task.is_finished());

        session.inbound.close_channel();
        let (end, _hub, _sink) = finish(session).await;

        assert_eq!(end, SessionEnd::StreamEnded);
    }

    #[tokio::test]
    async fn identity_change_leaves_nothing_behind_after_session_ends() {
        let session = start_session(RedirectConfig::default());
        session.inbound.unbounded_send(register_frame()).unwrap();
        wait_registered(&session.hub).await;
        session
            .inbound
            .unbounded_send(text(serde_json::json!({"type": "register", "from": "u2", "callback": "http://cb"})))
            .unwrap();

        session.inbound.close_channel();
        let (end, hub, _sink) = finish(session).await;

        assert_eq!(end, SessionEnd::StreamEnded);
        assert_eq!(hub.client_count().await.unwrap(), 0);
        assert_eq!(hub.lookup(&ClientId::new("u1").unwrap()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn disabled_redirects_only_drop_the_message() {
        let session = start_session(RedirectConfig::new(false, false));
        session.inbound.unbounded_send(register_frame()).unwrap();
        session
            .inbound
            .unbounded_send(text(serde_json::json!({"type": "message", "message": {"text": "hi"}})))
            .unwrap();
        wait_registered(&session.hub).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!session.task.is_finished());

        session.inbound.unbounded_send(close(close_code::AWAY)).unwrap();
        let (end, _hub, _sink) = finish(session).await;

        assert_eq!(end, SessionEnd::GoingAway);
    }

    #[tokio::test]
    async fn frontend_redirect_is_written_back_to_the_socket() {
        let session = start_session(RedirectConfig::new(true, false));
        session.inbound.unbounded_send(register_frame()).unwrap();
        session
            .inbound
            .unbounded_send(text(serde_json::json!({"type": "message", "message": {"text": "echo me"}})))
            .unwrap();

        let mut written = Vec::new();
        for _ in 0..100 {
            written = session.sink.texts();
            if !written.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let payload: OutboundPayload = serde_json::from_str(&written[0]).unwrap();
        assert_eq!(payload.to, "u1");
        assert_eq!(payload.message.text, "echo me");

        session.inbound.unbounded_send(close(close_code::AWAY)).unwrap();
        finish(session).await;
    }

    #[tokio::test]
    async fn ping_frames_are_ignored_and_stream_end_cleans_up() {
        let session = start_session(RedirectConfig::default());
        session.inbound.unbounded_send(Ok(Frame::Ping(vec![1]))).unwrap();
        session.inbound.unbounded_send(register_frame()).unwrap();
        wait_registered(&session.hub).await;

        session.inbound.close_channel();
        let (end, hub, sink) = finish(session).await;

        assert_eq!(end, SessionEnd::StreamEnded);
        assert_eq!(hub.client_count().await.unwrap(), 0);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }
}
