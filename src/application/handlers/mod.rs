//! Application handlers.
//!
//! - `deliver_outbound` - Queue handler delivering outbound messages to the hub

mod deliver_outbound;

pub use deliver_outbound::{OutboundDelivery, OUTBOUND_QUEUE};
