//! Reliable work queue with a retry lane.
//!
//! - `connection` - `QueueConnection` and named `Queue` handles
//! - `consumer` - Two-cursor consumer with stop signal and retry ceiling
//! - `redis_broker` - Redis list-backed `QueueBroker`
//! - `in_memory` - In-process `QueueBroker` for tests

mod connection;
mod consumer;
mod in_memory;
mod redis_broker;

pub use connection::{Queue, QueueConnection, REJECTED_SUFFIX, RETRY_SUFFIX};
pub use consumer::{Consumer, ConsumerHandle, ConsumerSettings, Cursor, PollOutcome};
pub use in_memory::InMemoryBroker;
pub use redis_broker::RedisBroker;
