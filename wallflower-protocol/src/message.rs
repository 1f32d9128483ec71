//! Tagged message envelope: one discriminator byte plus one string payload.
//!
//! This is the only payload shape the adapter speaks. The host represents
//! its to-backend type as a sum type and assigns constructor ordinals by
//! lexical sort of constructor names. Because `'A'` is the smallest byte a
//! valid constructor name can start with, a leading single-string
//! constructor named `A` always receives ordinal 0 — that compatibility
//! contract is what makes [`DEFAULT_TAG`] safe to assume.

use bytes::{BufMut, BytesMut};

use crate::string;

/// Discriminator ordinal of a leading constructor named `A`.
pub const DEFAULT_TAG: u8 = 0;

/// Smallest well-formed message: a tag byte plus an empty string.
const MIN_MESSAGE_LEN: usize = 2;

/// Encodes `payload` under the given discriminator tag.
pub fn encode_message(payload: &str, tag: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(payload.len() + 6);
    buf.put_u8(tag);
    string::put_string(&mut buf, payload);
    buf
}

/// Decodes a message expected to carry `expected_tag`.
///
/// Fails soft: returns `None` — not an error — when the buffer is shorter
/// than the minimum envelope, the tag differs, or the string payload does
/// not decode. This lets the frame classifier probe the message shape and
/// fall back to treating the frame as protocol control data.
pub fn decode_message(buf: &[u8], expected_tag: u8) -> Option<String> {
    if buf.len() < MIN_MESSAGE_LEN {
        return None;
    }
    if buf[0] != expected_tag {
        return None;
    }
    match string::decode_string(&buf[1..]) {
        Ok((payload, _)) => Some(payload),
        Err(_) => None,
    }
}
