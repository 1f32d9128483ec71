//! # wallflower-protocol
//!
//! Wire-level implementation of the host protocol spoken by the wallflower
//! WebSocket adapter.
//!
//! This crate provides:
//! - The host's Wire3 binary value codec: zigzag integer mapping,
//!   range-partitioned varints, and length-prefixed UTF-8 strings
//! - The tagged message envelope (discriminator byte + string payload)
//! - The JSON transport envelope with base64 payload wrapping, plus
//!   classification of inbound frames
//! - Session identifier generation and the `sid` cookie format
//!
//! Everything here is pure computation; no I/O and no async.

pub mod error;
pub mod frame;
pub mod message;
pub mod session;
pub mod string;
pub mod varint;

pub use error::ProtocolError;
pub use frame::{classify_frame, encode_frame, Inbound};
pub use message::{decode_message, encode_message, DEFAULT_TAG};
pub use session::{
    generate_session_id, session_cookie, session_from_cookie, SESSION_ID_LEN,
};

/// The largest integer the wire format represents exactly.
///
/// Values at and above 2^32 travel as an IEEE-754 float64, so integers
/// beyond 2^53 lose precision on the originating host.
pub const MAX_SAFE_INTEGER: u64 = 1 << 53;
