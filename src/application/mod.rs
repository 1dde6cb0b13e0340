//! Application layer - use cases that coordinate ports and adapters.

pub mod handlers;

pub use handlers::{OutboundDelivery, OUTBOUND_QUEUE};
