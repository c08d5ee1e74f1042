//! WebSocket transport layer.
//!
//! One `SocketClient` owns one connection to one endpoint, run by a
//! background task that reconnects with exponential backoff until the
//! client is closed. Built on `tokio-tungstenite`, generic over a connector
//! so tests can swap the network for an in-memory transport.

mod client;
mod connection;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::SocketClient;
pub use types::{ConnectionState, SocketConfig, SocketEvent};
