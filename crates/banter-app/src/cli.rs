use clap::Parser;

/// Banter — a terminal client for realtime chat rooms.
#[derive(Parser, Debug)]
#[command(name = "banter", version, about)]
pub struct Args {
    /// Chat server host, with port where needed.
    #[arg(long, default_value = "localhost:8000")]
    pub host: String,

    /// Room identifier to join.
    #[arg(short, long, default_value = "lobby")]
    pub room: String,

    /// User identifier to send as; generated when omitted.
    #[arg(short, long)]
    pub user: Option<String>,

    /// Connect over TLS (wss).
    #[arg(long)]
    pub secure: bool,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
