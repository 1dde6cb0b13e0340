//! Relay HTTP adapter.
//!
//! Provides endpoints for:
//! - Browser websocket sessions
//! - Queueing bot messages for connected clients
//! - Health checks

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::RelayAppState;
pub use routes::relay_router;
