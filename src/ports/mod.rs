//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the relay and the outside world. Adapters implement these ports.
//!
//! - `CallbackForwarder` - POSTs client messages to a bot webhook
//! - `QueueBroker` - Storage behind the reliable work queue
//! - `TaskHandler` - Work performed on each queue item

mod callback_forwarder;
mod queue_broker;
mod task_handler;

pub use callback_forwarder::{CallbackForwarder, ForwardError};
pub use queue_broker::{QueueBroker, QueueError};
pub use task_handler::{handler_fn, FnHandler, HandlerError, TaskHandler};
