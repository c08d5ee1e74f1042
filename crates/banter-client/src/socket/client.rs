//! Public handle for one socket connection.

use std::future::Future;
use std::sync::Arc;

use futures_util::{Sink, Stream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

use super::connection::{connection_loop, ws_connect};
use super::types::{ConnectionState, SocketCommand, SocketConfig, SocketEvent};

/// Handle for one WebSocket connection.
///
/// All methods are non-blocking and hand work to the background connection
/// task. Dropping every handle terminates that task.
pub struct SocketClient {
    command_tx: mpsc::Sender<SocketCommand>,
    state: Arc<RwLock<ConnectionState>>,
}

impl SocketClient {
    /// Open a connection and start the background task.
    /// Returns `(client, event_receiver)`.
    pub fn connect(config: SocketConfig) -> (Self, mpsc::Receiver<SocketEvent>) {
        Self::connect_with(config, ws_connect)
    }

    /// Like `connect`, but with a caller-supplied connector. Lets tests
    /// swap the network for an in-memory transport.
    pub(crate) fn connect_with<C, Fut, S>(
        config: SocketConfig,
        connector: C,
    ) -> (Self, mpsc::Receiver<SocketEvent>)
    where
        C: Fn(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<S, WsError>> + Send + 'static,
        S: Stream<Item = Result<WsMessage, WsError>>
            + Sink<WsMessage, Error = WsError>
            + Send
            + Unpin
            + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let state = Arc::new(RwLock::new(ConnectionState::Idle));

        let client = Self {
            command_tx,
            state: Arc::clone(&state),
        };

        tokio::spawn(connection_loop(connector, config, state, event_tx, command_rx));

        (client, event_rx)
    }

    /// Queue a text frame for sending. The connection task drops it if the
    /// socket is not open by the time it is forwarded.
    pub async fn send(&self, text: String) {
        let _ = self.command_tx.send(SocketCommand::Send(text)).await;
    }

    /// Request a graceful close. The connection task will not reconnect.
    pub async fn close(&self) {
        let _ = self.command_tx.send(SocketCommand::Close).await;
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Whether the socket is currently open.
    pub async fn is_open(&self) -> bool {
        matches!(self.state().await, ConnectionState::Open)
    }
}
