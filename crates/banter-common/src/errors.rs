#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("connection timed out after {0}s")]
    ConnectTimeout(u64),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum BanterError {
    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Other(String),
}
