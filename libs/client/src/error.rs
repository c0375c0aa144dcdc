use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the request (the explicit failure signal of a
    /// failed mutation; other clients never learn it happened).
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("gateway handshake failed: {0}")]
    Handshake(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("no active project")]
    NoActiveProject,
}
