//! Error types for the manager client

use serde::Serialize;
use thiserror::Error;

/// Broad classes of failure a dashboard has to deal with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Request never produced a usable response (connect, timeout, bad body)
    Transport,
    /// Backend answered with `success: false`
    Rejected,
    /// Push channel delivered a frame that could not be decoded
    MalformedFrame,
    /// Push channel transport failed or closed
    ChannelClosed,
    /// Local misuse: bad argument or bad configuration
    Local,
}

impl ErrorKind {
    /// Stable identifier, used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::Rejected => "REJECTED",
            ErrorKind::MalformedFrame => "MALFORMED_FRAME",
            ErrorKind::ChannelClosed => "CHANNEL_CLOSED",
            ErrorKind::Local => "LOCAL",
        }
    }
}

/// Errors produced by the API wrapper, the push channel and config loading
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request failed with status code {status}")]
    Status { status: u16 },

    #[error("unexpected response body: {0}")]
    Decode(String),

    /// Backend-reported logical failure; the message is shown as-is
    #[error("{message}")]
    Rejected { message: String },

    #[error("malformed push frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("push channel error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) | ClientError::Status { .. } | ClientError::Decode(_) => {
                ErrorKind::Transport
            }
            ClientError::Rejected { .. } => ErrorKind::Rejected,
            ClientError::Frame(_) => ErrorKind::MalformedFrame,
            ClientError::WebSocket(_) => ErrorKind::ChannelClosed,
            ClientError::InvalidArgument(_) | ClientError::Config(_) => ErrorKind::Local,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ClientError::Rejected {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
