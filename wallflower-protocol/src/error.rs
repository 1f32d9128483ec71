//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding wire data.
///
/// Low-level decoders return these directly. The message envelope layer
/// converts them into a soft "not a match" (`None`), and the inbound frame
/// classifier absorbs every failure into a classification kind, so nothing
/// above the codec ever observes a decode error.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("truncated input: need {needed} more byte(s)")]
    Truncated { needed: usize },

    /// A first byte that does not begin any known varint form.
    #[error("invalid varint marker byte: {0:#04x}")]
    InvalidMarker(u8),

    #[error("float-form integer is not a finite non-negative value: {0}")]
    InvalidFloat(f64),

    #[error("negative string length prefix: {0}")]
    NegativeLength(i64),

    #[error("invalid UTF-8 in string payload")]
    InvalidUtf8,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
