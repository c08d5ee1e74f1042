mod cli;

use banter_client::{
    PresenceChannel, PresenceConfig, RoomChannel, RoomConfig, DEFAULT_TYPING_DELAY,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("banter=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "banter=info".parse().unwrap()),
            ),
        )
        .init();

    let user_id = args.user.clone().unwrap_or_else(banter_common::new_id);
    tracing::info!("Banter v{} starting...", env!("CARGO_PKG_VERSION"));

    let room_config = RoomConfig {
        secure: args.secure,
        host: args.host.clone(),
        ..RoomConfig::default()
    };
    let mut room = RoomChannel::new(room_config, args.room.as_str(), user_id.as_str());

    room.on_message(|envelope| {
        let sender = envelope
            .get("sender_username")
            .and_then(|v| v.as_str())
            .or_else(|| envelope.get("sender_id").and_then(|v| v.as_str()))
            .unwrap_or("?");
        let text = envelope.get("message").and_then(|v| v.as_str()).unwrap_or("");
        println!("[{sender}] {text}");
    });
    room.on_typing(|envelope| {
        if envelope
            .get("is_typing")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            let who = envelope
                .get("username")
                .and_then(|v| v.as_str())
                .unwrap_or("someone");
            println!("... {who} is typing");
        }
    });
    room.on_status_change(|envelope| {
        let who = envelope
            .get("username")
            .and_then(|v| v.as_str())
            .unwrap_or("someone");
        let online = envelope
            .get("is_online")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        println!("* {} {} the room", who, if online { "joined" } else { "left" });
    });
    room.on_open(|| println!("* connected"));
    room.on_close(|| println!("* disconnected"));

    let presence_config = PresenceConfig {
        secure: args.secure,
        host: args.host.clone(),
        ..PresenceConfig::default()
    };
    let mut presence = PresenceChannel::new(presence_config);
    presence.on_status_change(|envelope| {
        let who = envelope
            .get("username")
            .and_then(|v| v.as_str())
            .unwrap_or("someone");
        let online = envelope
            .get("is_online")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        println!("* {who} is {}", if online { "online" } else { "offline" });
    });

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    room.setup_typing_detection(input_rx, DEFAULT_TYPING_DELAY);

    room.connect().await;
    presence.connect().await;

    println!(
        "Joined room '{}' as '{}'. Type messages and press Enter to send, Ctrl+C to quit.",
        args.room, user_id
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = input_tx.send(());
                    room.send_message(line).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "stdin error");
                    break;
                }
            },
        }
    }

    room.shutdown().await;
    presence.shutdown().await;
    tracing::info!("Shutdown complete");
}
