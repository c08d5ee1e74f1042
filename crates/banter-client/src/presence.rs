//! Global presence channel: online/offline status for all users.
//!
//! Structurally a smaller `RoomChannel`: one socket against the fixed
//! presence endpoint, one listener category, no outgoing operations.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dispatch::{ListenerSet, Subscription};
use crate::protocol::{parse_envelope, EventKind};
use crate::room::SocketSlot;
use crate::socket::{ConnectionState, SocketClient, SocketConfig, SocketEvent};

/// Endpoint path of the global presence feed.
const PRESENCE_PATH: &str = "/ws/online/";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the presence connection.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Use `wss` instead of `ws`.
    pub secure: bool,
    /// Chat server host, with port where needed.
    pub host: String,
    /// Connection-establishment timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Reconnect base delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            secure: false,
            host: "localhost:8000".to_string(),
            connect_timeout_secs: 15,
            reconnect_delay_secs: 3,
            max_reconnect_delay_secs: 30,
        }
    }
}

impl PresenceConfig {
    fn socket_config(&self) -> SocketConfig {
        SocketConfig {
            secure: self.secure,
            host: self.host.clone(),
            path: PRESENCE_PATH.to_string(),
            connect_timeout_secs: self.connect_timeout_secs,
            reconnect_delay_secs: self.reconnect_delay_secs,
            max_reconnect_delay_secs: self.max_reconnect_delay_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct PresenceListeners {
    status: ListenerSet<Value>,
}

/// Client-side channel for the global presence feed.
pub struct PresenceChannel {
    config: PresenceConfig,
    listeners: Arc<PresenceListeners>,
    socket: SocketSlot,
    dispatcher: Option<JoinHandle<()>>,
}

impl PresenceChannel {
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            config,
            listeners: Arc::new(PresenceListeners::default()),
            socket: Arc::new(RwLock::new(None)),
            dispatcher: None,
        }
    }

    /// Open the presence connection and start dispatching status events.
    /// Any previous connection is closed first.
    pub async fn connect(&mut self) {
        if let Some(old) = self.socket.write().await.take() {
            old.close().await;
        }
        let (socket, event_rx) = SocketClient::connect(self.config.socket_config());
        self.attach(socket, event_rx).await;
    }

    /// Wire an already-started socket into this channel. `connect` uses
    /// this with a real socket; tests inject an in-memory one.
    pub(crate) async fn attach(
        &mut self,
        socket: SocketClient,
        event_rx: mpsc::Receiver<SocketEvent>,
    ) {
        *self.socket.write().await = Some(socket);
        let listeners = Arc::clone(&self.listeners);
        self.dispatcher = Some(tokio::spawn(event_translator(event_rx, listeners)));
    }

    /// Request a graceful close. The socket will not reconnect afterwards.
    /// No-op when not connected.
    pub async fn disconnect(&self) {
        if let Some(socket) = self.socket.read().await.as_ref() {
            socket.close().await;
        }
    }

    /// Register a status-change listener.
    pub fn on_status_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listeners.status.subscribe(callback)
    }

    /// Remove a listener registered through `on_status_change`.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.listeners.status.remove(subscription)
    }

    /// Tear the channel down: close the socket, stop the dispatcher, and
    /// clear the listener set.
    pub async fn shutdown(&mut self) {
        if let Some(socket) = self.socket.write().await.take() {
            socket.close().await;
        }
        if let Some(task) = self.dispatcher.take() {
            task.abort();
        }
        self.listeners.status.clear();
    }

    /// Current connection state; `Idle` before the first `connect`.
    pub async fn state(&self) -> ConnectionState {
        match self.socket.read().await.as_ref() {
            Some(socket) => socket.state().await,
            None => ConnectionState::Idle,
        }
    }

    /// Whether the presence socket is currently open.
    pub async fn is_connected(&self) -> bool {
        matches!(self.state().await, ConnectionState::Open)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Background task translating socket events into listener invocations.
async fn event_translator(
    mut events: mpsc::Receiver<SocketEvent>,
    listeners: Arc<PresenceListeners>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SocketEvent::Connected => debug!("presence connected"),
            SocketEvent::Disconnected => debug!("presence disconnected"),
            SocketEvent::Error(message) => warn!(message = %message, "presence socket error"),
            SocketEvent::Frame(text) => match parse_envelope(&text) {
                Ok(envelope) => dispatch_envelope(&listeners, &envelope),
                Err(e) => warn!(error = %e, "dropping malformed frame"),
            },
        }
    }
}

fn dispatch_envelope(listeners: &PresenceListeners, envelope: &Value) {
    match EventKind::of(envelope) {
        EventKind::UserOnlineStatus | EventKind::UserStatus => {
            listeners.status.dispatch(envelope)
        }
        kind => debug!(?kind, "ignoring envelope"),
    }
}
