//! WebSocket adapters for browser chat sessions.
//!
//! # Architecture
//!
//! ```text
//!   browser ──frames──▶ connection::serve ──▶ Client (register / redirect)
//!                              ▲                 │            │
//!                              │ outbound        │ hub cmds   │ detached POST
//!                              │                 ▼            ▼
//!                        per-client channel ◀── Hub      CallbackForwarder
//!                                                ▲
//!                                   OutboundDelivery (queue consumer)
//! ```
//!
//! # Components
//!
//! - [`hub`] - Single-task registry of registered clients
//! - [`client`] - Per-socket protocol state machine
//! - [`connection`] - Read loop, write task and session cleanup
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod client;
pub mod connection;
pub mod handler;
pub mod hub;

pub use client::Client;
pub use connection::{serve, SessionEnd};
pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use hub::{ClientEntry, Hub, HubError, HubHandle, Target, WeakHubHandle};
