//! Background connection loop with auto-reconnect.
//!
//! One loop iteration is one connection attempt. Failures and dropped
//! connections schedule another attempt after the current backoff delay;
//! the delay doubles up to the configured ceiling and resets on success.
//! An explicit close stops the loop for good.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use banter_common::errors::SocketError;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::types::{ConnectionState, SocketCommand, SocketConfig, SocketEvent};

/// Connector used outside of tests: a real (optionally TLS) WebSocket dial.
pub(crate) async fn ws_connect(
    url: String,
) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, WsError> {
    let (stream, _response) = tokio_tungstenite::connect_async(&url).await?;
    Ok(stream)
}

/// Background task owning the connection and its reconnect policy.
pub(crate) async fn connection_loop<C, Fut, S>(
    connector: C,
    config: SocketConfig,
    state: Arc<RwLock<ConnectionState>>,
    event_tx: mpsc::Sender<SocketEvent>,
    command_rx: mpsc::Receiver<SocketCommand>,
) where
    C: Fn(String) -> Fut + Send + 'static,
    Fut: Future<Output = Result<S, WsError>> + Send + 'static,
    S: Stream<Item = Result<WsMessage, WsError>>
        + Sink<WsMessage, Error = WsError>
        + Send
        + Unpin
        + 'static,
{
    let command_rx = Arc::new(Mutex::new(command_rx));
    // Set once an explicit close is requested; decides whether the loop
    // reconnects or stops after a connection ends.
    let closing = Arc::new(AtomicBool::new(false));
    let mut reconnect_delay = config.reconnect_delay_secs;

    loop {
        let url = config.ws_url();
        *state.write().await = ConnectionState::Connecting;
        info!(url = %url, "connecting");

        match tokio::time::timeout(
            Duration::from_secs(config.connect_timeout_secs),
            connector(url),
        )
        .await
        {
            Ok(Ok(stream)) => {
                reconnect_delay = config.reconnect_delay_secs;
                run_connection(stream, &state, &event_tx, &command_rx, &closing).await;

                if closing.load(Ordering::SeqCst) {
                    *state.write().await = ConnectionState::Closed;
                    let _ = event_tx.send(SocketEvent::Disconnected).await;
                    info!("socket closed");
                    return;
                }
                *state.write().await = ConnectionState::Errored;
                let _ = event_tx.send(SocketEvent::Disconnected).await;
            }
            Ok(Err(e)) => {
                let err = SocketError::ConnectFailed(e.to_string());
                error!(error = %err, "connect failed");
                *state.write().await = ConnectionState::Errored;
                let _ = event_tx.send(SocketEvent::Error(err.to_string())).await;
            }
            Err(_elapsed) => {
                let err = SocketError::ConnectTimeout(config.connect_timeout_secs);
                error!(error = %err, "connect timed out");
                *state.write().await = ConnectionState::Errored;
                let _ = event_tx.send(SocketEvent::Error(err.to_string())).await;
            }
        }

        info!(delay = reconnect_delay, "reconnecting after delay");
        if !wait_reconnect(reconnect_delay, &command_rx, &state).await {
            return;
        }
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay_secs);
    }
}

/// One connected phase: forward commands out, surface frames in. Returns
/// when the transport ends, either side closes, or an error occurs.
async fn run_connection<S>(
    stream: S,
    state: &Arc<RwLock<ConnectionState>>,
    event_tx: &mpsc::Sender<SocketEvent>,
    command_rx: &Arc<Mutex<mpsc::Receiver<SocketCommand>>>,
    closing: &Arc<AtomicBool>,
) where
    S: Stream<Item = Result<WsMessage, WsError>>
        + Sink<WsMessage, Error = WsError>
        + Send
        + Unpin
        + 'static,
{
    *state.write().await = ConnectionState::Open;
    let _ = event_tx.send(SocketEvent::Connected).await;

    let (ws_write, mut ws_read) = stream.split();

    let cmd_handle = tokio::spawn(command_forwarder(
        Arc::clone(command_rx),
        ws_write,
        Arc::clone(state),
        Arc::clone(closing),
    ));

    while let Some(message) = ws_read.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                let _ = event_tx.send(SocketEvent::Frame(text.to_string())).await;
            }
            Ok(WsMessage::Close(_)) => {
                info!("server closed connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "websocket error");
                let _ = event_tx.send(SocketEvent::Error(e.to_string())).await;
                break;
            }
            // Pings and pongs are answered by tungstenite; binary frames
            // are not part of the protocol.
            _ => {}
        }
    }

    cmd_handle.abort();
}

/// Forward queued commands onto the open socket. Exits once a close is
/// requested or every client handle is gone.
async fn command_forwarder<W>(
    command_rx: Arc<Mutex<mpsc::Receiver<SocketCommand>>>,
    mut ws_write: W,
    state: Arc<RwLock<ConnectionState>>,
    closing: Arc<AtomicBool>,
) where
    W: Sink<WsMessage, Error = WsError> + Send + Unpin + 'static,
{
    let mut rx = command_rx.lock().await;
    loop {
        match rx.recv().await {
            Some(SocketCommand::Send(text)) => {
                if let Err(e) = ws_write.send(WsMessage::Text(text.into())).await {
                    warn!(error = %e, "send failed");
                }
            }
            Some(SocketCommand::Close) | None => {
                closing.store(true, Ordering::SeqCst);
                *state.write().await = ConnectionState::Closing;
                let _ = ws_write.send(WsMessage::Close(None)).await;
                return;
            }
        }
    }
}

/// Sleep out the reconnect delay while still draining commands: sends are
/// dropped while disconnected, and a close (or the last handle dropping)
/// stops the loop for good. Returns false when the loop should stop.
async fn wait_reconnect(
    delay_secs: u64,
    command_rx: &Arc<Mutex<mpsc::Receiver<SocketCommand>>>,
    state: &Arc<RwLock<ConnectionState>>,
) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(delay_secs);
    let mut rx = command_rx.lock().await;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return true,
            command = rx.recv() => match command {
                Some(SocketCommand::Send(_)) => {
                    debug!("dropping send while disconnected");
                }
                Some(SocketCommand::Close) | None => {
                    *state.write().await = ConnectionState::Closed;
                    info!("socket closed");
                    return false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::testing::MemoryConnector;
    use crate::socket::SocketClient;

    fn test_config() -> SocketConfig {
        SocketConfig {
            host: "test".to_string(),
            path: "/ws/chat/42/".to_string(),
            ..SocketConfig::default()
        }
    }

    #[tokio::test]
    async fn frames_round_trip() {
        let (connector, mut listener) = MemoryConnector::new();
        let (client, mut events) =
            SocketClient::connect_with(test_config(), connector.connector());

        let mut server = listener.accepted.recv().await.unwrap();
        assert!(matches!(events.recv().await, Some(SocketEvent::Connected)));
        assert_eq!(client.state().await, ConnectionState::Open);

        server.send_text(r#"{"type":"message","message":"hey"}"#);
        match events.recv().await {
            Some(SocketEvent::Frame(text)) => {
                assert_eq!(text, r#"{"type":"message","message":"hey"}"#)
            }
            other => panic!("unexpected event: {other:?}"),
        }

        client.send("outbound".to_string()).await;
        assert_eq!(server.recv_text().await.as_deref(), Some("outbound"));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_configured_delay() {
        let (connector, mut listener) = MemoryConnector::new();
        let (_client, mut events) =
            SocketClient::connect_with(test_config(), connector.connector());

        let first_attempt = listener.attempts.recv().await.unwrap();
        let server = listener.accepted.recv().await.unwrap();
        assert!(matches!(events.recv().await, Some(SocketEvent::Connected)));

        // Tear the transport down from the server side.
        drop(server);
        assert!(matches!(events.recv().await, Some(SocketEvent::Disconnected)));

        let second_attempt = listener.attempts.recv().await.unwrap();
        let gap = second_attempt - first_attempt;
        assert!(gap >= Duration::from_secs(3), "gap was {gap:?}");
        assert!(gap < Duration::from_secs(4), "gap was {gap:?}");

        // Exactly one new attempt was scheduled.
        assert!(listener.attempts.try_recv().is_err());
        assert!(matches!(events.recv().await, Some(SocketEvent::Connected)));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_then_caps() {
        let (connector, mut listener) = MemoryConnector::new();
        connector.fail_next(usize::MAX);

        let config = SocketConfig {
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 4,
            ..test_config()
        };
        let (_client, _events) = SocketClient::connect_with(config, connector.connector());

        let mut attempts = Vec::new();
        for _ in 0..5 {
            attempts.push(listener.attempts.recv().await.unwrap());
        }

        let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
        for (gap, expected_secs) in gaps.iter().zip([1u64, 2, 4, 4]) {
            let expected = Duration::from_secs(expected_secs);
            assert!(
                *gap >= expected && *gap < expected + Duration::from_millis(100),
                "gap was {gap:?}, expected ~{expected:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_resets_after_successful_connect() {
        let (connector, mut listener) = MemoryConnector::new();
        connector.fail_next(2);

        let config = SocketConfig {
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 8,
            ..test_config()
        };
        let (_client, _events) = SocketClient::connect_with(config, connector.connector());

        // Two refused attempts, then a successful one.
        let _first = listener.attempts.recv().await.unwrap();
        let _second = listener.attempts.recv().await.unwrap();
        let third = listener.attempts.recv().await.unwrap();
        let server = listener.accepted.recv().await.unwrap();

        // Drop the connection; the next delay starts over from the base
        // instead of continuing to grow.
        drop(server);
        let fourth = listener.attempts.recv().await.unwrap();
        let gap = fourth - third;
        assert!(gap >= Duration::from_secs(1), "gap was {gap:?}");
        assert!(gap < Duration::from_secs(2), "gap was {gap:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn close_suppresses_reconnect() {
        let (connector, mut listener) = MemoryConnector::new();
        let (client, mut events) =
            SocketClient::connect_with(test_config(), connector.connector());

        let mut server = listener.accepted.recv().await.unwrap();
        assert!(matches!(events.recv().await, Some(SocketEvent::Connected)));
        let _ = listener.attempts.recv().await.unwrap();

        client.close().await;
        assert!(server.recv_close().await);
        server.close();

        assert!(matches!(events.recv().await, Some(SocketEvent::Disconnected)));
        assert_eq!(client.state().await, ConnectionState::Closed);

        // Even well past the reconnect delay, no new attempt is made.
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(listener.attempts.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn close_during_backoff_stops_loop() {
        let (connector, mut listener) = MemoryConnector::new();
        connector.fail_next(usize::MAX);

        let (client, mut events) =
            SocketClient::connect_with(test_config(), connector.connector());

        let _first = listener.attempts.recv().await.unwrap();
        assert!(matches!(events.recv().await, Some(SocketEvent::Error(_))));

        client.close().await;
        for _ in 0..1000 {
            if client.state().await == ConnectionState::Closed {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(client.state().await, ConnectionState::Closed);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(listener.attempts.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sends_while_disconnected_are_dropped() {
        let (connector, mut listener) = MemoryConnector::new();
        connector.fail_next(1);

        let (client, mut events) =
            SocketClient::connect_with(test_config(), connector.connector());

        let _first = listener.attempts.recv().await.unwrap();
        assert!(matches!(events.recv().await, Some(SocketEvent::Error(_))));

        // Queued while the loop is waiting to reconnect; never transmitted.
        client.send("too early".to_string()).await;

        let mut server = listener.accepted.recv().await.unwrap();
        assert!(matches!(events.recv().await, Some(SocketEvent::Connected)));

        client.send("on time".to_string()).await;
        assert_eq!(server.recv_text().await.as_deref(), Some("on time"));
    }
}
