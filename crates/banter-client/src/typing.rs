//! Debounced typing-indicator sends.
//!
//! Translates a stream of raw input-event notifications into typing
//! indicator frames: one start at the beginning of an input burst, one stop
//! once the input has been idle for the configured delay.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::ClientFrame;
use crate::room::{send_frame, SocketSlot};

/// Idle time after the last input event before a typing-stop is sent.
pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(1000);

/// Spawn the monitor task. Each `()` received on `input_events` is one user
/// input notification. The task ends when the input source closes.
pub(crate) fn spawn_typing_monitor(
    socket: SocketSlot,
    mut input_events: mpsc::UnboundedReceiver<()>,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            // Idle: wait for the first event of a burst.
            if input_events.recv().await.is_none() {
                return;
            }
            send_frame(&socket, ClientFrame::Typing { is_typing: true }).await;

            // Typing: every further event re-arms the stop timer, so the
            // stop fires `delay` after the last event of the burst.
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        send_frame(&socket, ClientFrame::Typing { is_typing: false }).await;
                        break;
                    }
                    event = input_events.recv() => {
                        if event.is_none() {
                            return;
                        }
                    }
                }
            }
        }
    })
}
