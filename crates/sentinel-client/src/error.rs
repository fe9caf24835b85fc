//! Client error type.

use sentinel_core::FrameError;

/// Errors surfaced by the telemetry client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The socket is not open; the frame was dropped, not queued.
    #[error("not connected")]
    NotConnected,

    #[error("connect to {url} failed: {detail}")]
    Connect { url: String, detail: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The client task has stopped (explicit disconnect or reconnects exhausted).
    #[error("client stopped")]
    Stopped,
}

/// Client result alias.
pub type Result<T> = std::result::Result<T, ClientError>;
