//! Domain value types for the relay.
//!
//! Nothing here performs I/O: the wire payloads, client identities,
//! redirect outcomes and protocol errors are plain values shared by the
//! websocket, callback and queue adapters.

pub mod errors;
pub mod identity;
pub mod payload;
pub mod redirect;

pub use errors::ProtocolError;
pub use identity::{ClientId, ConnectionId};
pub use payload::{InboundPayload, Message, OutboundPayload, MESSAGE, REGISTER};
pub use redirect::Redirects;
