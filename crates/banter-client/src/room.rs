//! Room channel: chat messages, typing indicators, and user status events
//! for one chat room.
//!
//! A `RoomChannel` owns one socket, a dispatcher task that fans incoming
//! envelopes out to registered listeners, and an optional typing monitor.
//! The transport layer is handled by `socket::SocketClient`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dispatch::{ListenerSet, Subscription};
use crate::protocol::{parse_envelope, ClientFrame, EventKind};
use crate::socket::{ConnectionState, SocketClient, SocketConfig, SocketEvent};
use crate::typing::spawn_typing_monitor;

/// Shared slot holding the channel's current socket, if any. The typing
/// monitor reads it so indicator sends always target the latest connection.
pub(crate) type SocketSlot = Arc<RwLock<Option<SocketClient>>>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a room connection.
#[derive(Debug, Clone)]
pub struct RoomConfig {
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

impl Default for RoomConfig {
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

impl RoomConfig {
    fn socket_config(&self, room_id: &str) -> SocketConfig {
        SocketConfig {
            secure: self.secure,
            host: self.host.clone(),
            path: format!("/ws/chat/{room_id}/"),
            connect_timeout_secs: self.connect_timeout_secs,
            reconnect_delay_secs: self.reconnect_delay_secs,
            max_reconnect_delay_secs: self.max_reconnect_delay_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RoomListeners {
    message: ListenerSet<Value>,
    typing: ListenerSet<Value>,
    status: ListenerSet<Value>,
    opened: ListenerSet<()>,
    closed: ListenerSet<()>,
    errored: ListenerSet<String>,
}

impl RoomListeners {
    fn clear_all(&self) {
        self.message.clear();
        self.typing.clear();
        self.status.clear();
        self.opened.clear();
        self.closed.clear();
        self.errored.clear();
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Client-side channel for one chat room.
pub struct RoomChannel {
    config: RoomConfig,
    room_id: String,
    sender_id: String,
    listeners: Arc<RoomListeners>,
    socket: SocketSlot,
    dispatcher: Option<JoinHandle<()>>,
    typing_monitor: Option<JoinHandle<()>>,
}

impl RoomChannel {
    /// Create a channel for `room_id`, sending as `sender_id`. Both
    /// identifiers are opaque and unvalidated.
    pub fn new(
        config: RoomConfig,
        room_id: impl Into<String>,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            config,
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            listeners: Arc::new(RoomListeners::default()),
            socket: Arc::new(RwLock::new(None)),
            dispatcher: None,
            typing_monitor: None,
        }
    }

    /// Open the room connection and start dispatching incoming events.
    /// Any previous connection is closed first; registered listeners carry
    /// over to the new connection.
    pub async fn connect(&mut self) {
        if let Some(old) = self.socket.write().await.take() {
            old.close().await;
        }
        let (socket, event_rx) = SocketClient::connect(self.config.socket_config(&self.room_id));
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
        // A previous dispatcher ends on its own once its event stream
        // closes.
        self.dispatcher = Some(tokio::spawn(event_translator(event_rx, listeners)));
    }

    /// Request a graceful close. The socket will not reconnect afterwards.
    /// No-op when not connected.
    pub async fn disconnect(&self) {
        if let Some(socket) = self.socket.read().await.as_ref() {
            socket.close().await;
        }
    }

    /// Send a chat message. Dropped silently unless the socket is open.
    pub async fn send_message(&self, content: &str) {
        let frame = ClientFrame::Message {
            message: content.to_string(),
            sender_id: self.sender_id.clone(),
        };
        send_frame(&self.socket, frame).await;
    }

    /// Send a typing-state change. Dropped silently unless the socket is
    /// open.
    pub async fn send_typing_indicator(&self, is_typing: bool) {
        send_frame(&self.socket, ClientFrame::Typing { is_typing }).await;
    }

    /// Dispatch a parsed envelope to the listener set matching its `type`
    /// field. Unknown types are ignored.
    pub fn handle_envelope(&self, envelope: &Value) {
        dispatch_envelope(&self.listeners, envelope);
    }

    /// Register a chat-message listener.
    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listeners.message.subscribe(callback)
    }

    /// Register a typing-notification listener.
    pub fn on_typing<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listeners.typing.subscribe(callback)
    }

    /// Register a user-status listener.
    pub fn on_status_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listeners.status.subscribe(callback)
    }

    /// Register a listener invoked every time the connection opens,
    /// including after automatic reconnects.
    pub fn on_open<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.opened.subscribe(move |_| callback())
    }

    /// Register a listener invoked every time the connection closes.
    pub fn on_close<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.closed.subscribe(move |_| callback())
    }

    /// Register a listener for transport-level errors.
    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.listeners.errored.subscribe(move |e: &String| callback(e))
    }

    /// Remove a listener registered through any `on_*` method.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let l = &self.listeners;
        l.message.remove(subscription)
            || l.typing.remove(subscription)
            || l.status.remove(subscription)
            || l.opened.remove(subscription)
            || l.closed.remove(subscription)
            || l.errored.remove(subscription)
    }

    /// Start a typing monitor fed by `input_events`, where each received
    /// `()` is one user input notification. Replaces any previous monitor.
    pub fn setup_typing_detection(
        &mut self,
        input_events: mpsc::UnboundedReceiver<()>,
        delay: Duration,
    ) {
        let handle = spawn_typing_monitor(Arc::clone(&self.socket), input_events, delay);
        if let Some(old) = self.typing_monitor.replace(handle) {
            old.abort();
        }
    }

    /// Tear the channel down: close the socket, stop background tasks, and
    /// clear every listener set.
    pub async fn shutdown(&mut self) {
        if let Some(socket) = self.socket.write().await.take() {
            socket.close().await;
        }
        if let Some(task) = self.typing_monitor.take() {
            task.abort();
        }
        if let Some(task) = self.dispatcher.take() {
            task.abort();
        }
        self.listeners.clear_all();
    }

    /// Current connection state; `Idle` before the first `connect`.
    pub async fn state(&self) -> ConnectionState {
        match self.socket.read().await.as_ref() {
            Some(socket) => socket.state().await,
            None => ConnectionState::Idle,
        }
    }

    /// Whether the room socket is currently open.
    pub async fn is_connected(&self) -> bool {
        matches!(self.state().await, ConnectionState::Open)
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

/// Serialize and transmit a frame when the slot holds an open socket;
/// otherwise the frame is dropped.
pub(crate) async fn send_frame(slot: &SocketSlot, frame: ClientFrame) {
    let guard = slot.read().await;
    let Some(socket) = guard.as_ref() else {
        debug!("no connection; dropping frame");
        return;
    };
    if !socket.is_open().await {
        debug!("socket not open; dropping frame");
        return;
    }
    match frame.to_json() {
        Ok(json) => socket.send(json).await,
        Err(e) => warn!(error = %e, "failed to serialize frame"),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Background task translating socket events into listener invocations.
async fn event_translator(mut events: mpsc::Receiver<SocketEvent>, listeners: Arc<RoomListeners>) {
    while let Some(event) = events.recv().await {
        match event {
            SocketEvent::Connected => listeners.opened.dispatch(&()),
            SocketEvent::Disconnected => listeners.closed.dispatch(&()),
            SocketEvent::Error(message) => listeners.errored.dispatch(&message),
            SocketEvent::Frame(text) => match parse_envelope(&text) {
                Ok(envelope) => dispatch_envelope(&listeners, &envelope),
                Err(e) => warn!(error = %e, "dropping malformed frame"),
            },
        }
    }
}

fn dispatch_envelope(listeners: &RoomListeners, envelope: &Value) {
    match EventKind::of(envelope) {
        EventKind::Message => listeners.message.dispatch(envelope),
        EventKind::Typing => listeners.typing.dispatch(envelope),
        EventKind::UserStatus => listeners.status.dispatch(envelope),
        kind => debug!(?kind, "ignoring envelope"),
    }
}
