//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `websocket` - Hub, client protocol and browser connections
//! - `callback` - Webhook forwarding (HTTP, recording)
//! - `queue` - Reliable work queue (Redis, in-memory)
//! - `http` - Axum router

pub mod callback;
pub mod http;
pub mod queue;
pub mod websocket;

pub use callback::{HttpCallbackForwarder, RecordingForwarder};
pub use queue::{Consumer, ConsumerHandle, InMemoryBroker, Queue, QueueConnection, RedisBroker};
pub use websocket::{Hub, HubHandle};
