//! HTTP adapters - REST and websocket endpoints.

pub mod relay;

pub use relay::{relay_router, RelayAppState};
