//! Configuration, lifecycle state, and event/command enums for the socket
//! client.

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a single socket endpoint.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Use `wss` instead of `ws`.
    pub secure: bool,
    /// Server host, with port where needed (e.g. "chat.example.com:8000").
    pub host: String,
    /// Endpoint path (e.g. "/ws/chat/42/").
    pub path: String,
    /// Connection-establishment timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Reconnect base delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            secure: false,
            host: "localhost:8000".to_string(),
            path: "/".to_string(),
            connect_timeout_secs: 15,
            reconnect_delay_secs: 3,
            max_reconnect_delay_secs: 30,
        }
    }
}

impl SocketConfig {
    /// Build the WebSocket URL for this endpoint.
    pub(crate) fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}{}", scheme, self.host, self.path)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle of the connection owned by a `SocketClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt has started yet.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The socket is open; sends are forwarded.
    Open,
    /// A graceful close was requested and is in progress.
    Closing,
    /// Closed intentionally. Terminal: no reconnect is scheduled.
    Closed,
    /// The transport failed; a reconnect is pending.
    Errored,
}

// ---------------------------------------------------------------------------
// Events & Commands
// ---------------------------------------------------------------------------

/// Events emitted by the socket client.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Connection established.
    Connected,
    /// A text frame arrived.
    Frame(String),
    /// Connection lost or closed.
    Disconnected,
    /// Transport-level error, stringified.
    Error(String),
}

/// Commands sent to the background connection task.
#[derive(Debug)]
pub(crate) enum SocketCommand {
    Send(String),
    Close,
}
