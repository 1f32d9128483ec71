//! Client error types.

use thiserror::Error;

use crate::connection::ReadyState;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] wallflower_protocol::ProtocolError),

    #[error("connection is not open (ready state {0:?})")]
    NotOpen(ReadyState),

    #[error("connection closed")]
    Closed,

    #[error("cookie is not a valid header value: {0:?}")]
    InvalidCookie(String),
}
