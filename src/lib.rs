//! Webchat Relay - real-time bridge between browser chat clients and bots.
//!
//! Browser clients connect over a websocket, register an identity and a
//! callback URL, and their messages are mirrored back to the frontend,
//! forwarded to the callback webhook, or both. Bot backends reply through
//! a reliable work queue that delivers to the registered client.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
