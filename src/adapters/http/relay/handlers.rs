//! HTTP handlers for relay endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::adapters::queue::Queue;
use crate::adapters::websocket::WebSocketState;
use crate::domain::OutboundPayload;

use super::dto::{ErrorResponse, HealthResponse, SendMessageRequest, SendMessageResponse};

/// Application state for relay endpoints.
#[derive(Clone)]
pub struct RelayAppState {
    /// Hub, forwarder and routing switches for `/ws`
    pub websocket: WebSocketState,
    /// Queue `POST /messages` publishes to
    pub outbound_queue: Queue,
}

/// Queue a message for delivery to a connected client.
///
/// POST /messages
pub async fn send_message(
    State(state): State<RelayAppState>,
    Json(request): Json<SendMessageRequest>,
) -> impl IntoResponse {
    if request.to.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("`to` must not be blank")),
        )
            .into_response();
    }

    let payload = OutboundPayload::from(request);
    match state.outbound_queue.publish_json(&payload).await {
        Ok(()) => {
            tracing::debug!(client_id = %payload.to, "Outbound message queued");
            (
                StatusCode::ACCEPTED,
                Json(SendMessageResponse { queued: true }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(client_id = %payload.to, error = %e, "Failed to queue outbound message");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Liveness plus the number of registered clients.
///
/// GET /healthcheck
pub async fn healthcheck(State(state): State<RelayAppState>) -> impl IntoResponse {
    match state.websocket.hub.client_count().await {
        Ok(clients) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                clients,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
    }
}
