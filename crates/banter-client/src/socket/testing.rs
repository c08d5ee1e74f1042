//! In-memory transport for exercising the connection loop without a
//! network.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Sink, Stream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

/// Client half of an in-memory socket pair.
pub(crate) struct MemorySocket {
    incoming: mpsc::UnboundedReceiver<Result<WsMessage, WsError>>,
    outgoing: mpsc::UnboundedSender<WsMessage>,
}

impl Stream for MemorySocket {
    type Item = Result<WsMessage, WsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.incoming.poll_recv(cx)
    }
}

impl Sink<WsMessage> for MemorySocket {
    type Error = WsError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsMessage) -> Result<(), WsError> {
        self.outgoing.send(item).map_err(|_| WsError::ConnectionClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }
}

/// Server half handed to the test when a connection attempt is accepted.
/// Dropping it tears the transport down under the client.
pub(crate) struct MemoryServer {
    to_client: mpsc::UnboundedSender<Result<WsMessage, WsError>>,
    from_client: mpsc::UnboundedReceiver<WsMessage>,
}

impl MemoryServer {
    pub(crate) fn send_text(&self, text: &str) {
        let _ = self.to_client.send(Ok(WsMessage::Text(text.into())));
    }

    pub(crate) fn close(&self) {
        let _ = self.to_client.send(Ok(WsMessage::Close(None)));
    }

    /// Next text frame sent by the client, skipping control frames.
    pub(crate) async fn recv_text(&mut self) -> Option<String> {
        while let Some(message) = self.from_client.recv().await {
            if let WsMessage::Text(text) = message {
                return Some(text.to_string());
            }
        }
        None
    }

    /// Wait for the client's close frame.
    pub(crate) async fn recv_close(&mut self) -> bool {
        while let Some(message) = self.from_client.recv().await {
            if matches!(message, WsMessage::Close(_)) {
                return true;
            }
        }
        false
    }

    pub(crate) fn try_recv(&mut self) -> Option<WsMessage> {
        self.from_client.try_recv().ok()
    }
}

/// Test-side view of connection attempts.
pub(crate) struct MemoryListener {
    pub(crate) accepted: mpsc::UnboundedReceiver<MemoryServer>,
    pub(crate) attempts: mpsc::UnboundedReceiver<tokio::time::Instant>,
}

/// Connector factory. Every attempt is timestamped, then either refused or
/// accepted with a fresh in-memory socket pair.
pub(crate) struct MemoryConnector {
    failures_left: Arc<AtomicUsize>,
    accept_tx: mpsc::UnboundedSender<MemoryServer>,
    attempt_tx: mpsc::UnboundedSender<tokio::time::Instant>,
}

impl MemoryConnector {
    pub(crate) fn new() -> (Self, MemoryListener) {
        let (accept_tx, accepted) = mpsc::unbounded_channel();
        let (attempt_tx, attempts) = mpsc::unbounded_channel();
        (
            Self {
                failures_left: Arc::new(AtomicUsize::new(0)),
                accept_tx,
                attempt_tx,
            },
            MemoryListener { accepted, attempts },
        )
    }

    /// Refuse the next `n` connection attempts. `usize::MAX` refuses every
    /// attempt.
    pub(crate) fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Build the connector function to pass to `SocketClient::connect_with`.
    pub(crate) fn connector(
        &self,
    ) -> impl Fn(String) -> Pin<Box<dyn Future<Output = Result<MemorySocket, WsError>> + Send>>
           + Send
           + 'static {
        let failures_left = Arc::clone(&self.failures_left);
        let accept_tx = self.accept_tx.clone();
        let attempt_tx = self.attempt_tx.clone();
        move |_url| {
            let failures_left = Arc::clone(&failures_left);
            let accept_tx = accept_tx.clone();
            let attempt_tx = attempt_tx.clone();
            Box::pin(async move {
                let _ = attempt_tx.send(tokio::time::Instant::now());
                let remaining = failures_left.load(Ordering::SeqCst);
                if remaining > 0 {
                    if remaining != usize::MAX {
                        failures_left.store(remaining - 1, Ordering::SeqCst);
                    }
                    return Err(WsError::Io(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    )));
                }
                let (to_client, incoming) = mpsc::unbounded_channel();
                let (outgoing, from_client) = mpsc::unbounded_channel();
                let _ = accept_tx.send(MemoryServer {
                    to_client,
                    from_client,
                });
                Ok(MemorySocket { incoming, outgoing })
            })
        }
    }
}
