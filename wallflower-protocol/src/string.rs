//! Length-prefixed UTF-8 string codec.
//!
//! A string travels as the signed varint of its UTF-8 byte length (not its
//! character count) followed by the UTF-8 bytes. Rust's `str` guarantees
//! valid UTF-8, so every input is encodable.

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::varint;

/// Appends the encoding of `s` to `buf`.
pub fn put_string(buf: &mut BytesMut, s: &str) {
    varint::put_int(buf, s.len() as i64);
    buf.put_slice(s.as_bytes());
}

/// Encodes a single string.
pub fn encode_string(s: &str) -> BytesMut {
    let mut buf = BytesMut::with_capacity(s.len() + 2);
    put_string(&mut buf, s);
    buf
}

/// Decodes a string from the front of `buf`.
///
/// Returns the string and the number of bytes consumed. Fails with
/// [`ProtocolError::Truncated`] when fewer bytes remain than the prefix
/// declares, [`ProtocolError::NegativeLength`] on a negative prefix, and
/// [`ProtocolError::InvalidUtf8`] on malformed payload bytes.
pub fn decode_string(buf: &[u8]) -> Result<(String, usize), ProtocolError> {
    let (declared, prefix) = varint::decode_int(buf)?;
    if declared < 0 {
        return Err(ProtocolError::NegativeLength(declared));
    }
    let len = declared as usize;
    let rest = &buf[prefix..];
    if rest.len() < len {
        return Err(ProtocolError::Truncated {
            needed: len - rest.len(),
        });
    }
    let s = std::str::from_utf8(&rest[..len]).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok((s.to_owned(), prefix + len))
}
