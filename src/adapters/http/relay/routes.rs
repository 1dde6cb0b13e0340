//! Axum router configuration for the relay.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::websocket_router;

use super::handlers::{healthcheck, send_message, RelayAppState};

/// Create the complete relay router.
///
/// # Routes
/// - `GET /ws` - Upgrade to a chat websocket
/// - `POST /messages` - Queue a message for a connected client
/// - `GET /healthcheck` - Liveness and registered client count
pub fn relay_router(state: RelayAppState) -> Router {
    let websocket: Router = websocket_router().with_state(state.websocket.clone());

    Router::new()
        .route("/messages", post(send_message))
        .route("/healthcheck", get(healthcheck))
        .with_state(state)
        .merge(websocket)
        .layer(TraceLayer::new_for_http())
}
