//! Variable-length integer codec.
//!
//! Unsigned values are range-partitioned on the first byte rather than
//! using per-byte continuation bits:
//!
//! ```text
//! +---------------------+-------+--------------------------------------+
//! | range               | bytes | layout                               |
//! +---------------------+-------+--------------------------------------+
//! | 0..=215             | 1     | [n]                                  |
//! | 216..=9431          | 2     | [216 + (n-216)/256, (n-216)%256]     |
//! | 9432..=65535        | 3     | [252, u16 big-endian]                |
//! | 65536..2^24         | 4     | [253, 3-byte big-endian]             |
//! | 2^24..2^32          | 5     | [254, u32 big-endian]                |
//! | 2^32..              | 9     | [255, f64 little-endian]             |
//! +---------------------+-------+--------------------------------------+
//! ```
//!
//! The encoder always emits the shortest form, so encodings of values in
//! 0..=9431 order the same way as the values themselves under
//! length-then-lexicographic comparison.
//!
//! Signed values go through the zigzag map first, which keeps small
//! magnitudes in the one-byte range (|n| <= 107 encodes as a single byte).
//!
//! The float64 form is exact only up to 2^53 ([`crate::MAX_SAFE_INTEGER`]);
//! callers encoding larger values must accept the precision loss the
//! originating host's double arithmetic implies. For signed values the safe
//! round-trip range is [-2^52, 2^52].

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;

/// First byte of the 2-byte form lower bound (and largest 1-byte value + 1).
const TWO_BYTE_BASE: u64 = 216;
/// Largest value representable in the 2-byte form.
const TWO_BYTE_MAX: u64 = 9431;
/// Marker bytes for the fixed-width forms.
const MARKER_U16: u8 = 252;
const MARKER_U24: u8 = 253;
const MARKER_U32: u8 = 254;
const MARKER_F64: u8 = 255;

/// Maps a signed integer onto the unsigned line so that small magnitudes
/// map to small values: n >= 0 becomes 2n, n < 0 becomes -2n - 1.
pub fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag`].
pub fn unzigzag(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

/// Appends the encoding of `n` to `buf`.
pub fn put_uint(buf: &mut BytesMut, n: u64) {
    match n {
        0..=215 => buf.put_u8(n as u8),
        TWO_BYTE_BASE..=TWO_BYTE_MAX => {
            let offset = n - TWO_BYTE_BASE;
            buf.put_u8(TWO_BYTE_BASE as u8 + (offset / 256) as u8);
            buf.put_u8((offset % 256) as u8);
        }
        9432..=65535 => {
            buf.put_u8(MARKER_U16);
            buf.put_u16(n as u16);
        }
        65536..=0xFF_FFFF => {
            buf.put_u8(MARKER_U24);
            let be = (n as u32).to_be_bytes();
            buf.put_slice(&be[1..]);
        }
        0x100_0000..=0xFFFF_FFFF => {
            buf.put_u8(MARKER_U32);
            buf.put_u32(n as u32);
        }
        _ => {
            buf.put_u8(MARKER_F64);
            buf.put_f64_le(n as f64);
        }
    }
}

/// Appends the zigzag encoding of `n` to `buf`.
pub fn put_int(buf: &mut BytesMut, n: i64) {
    put_uint(buf, zigzag(n));
}

/// Encodes a single unsigned value.
pub fn encode_uint(n: u64) -> BytesMut {
    let mut buf = BytesMut::with_capacity(9);
    put_uint(&mut buf, n);
    buf
}

/// Encodes a single signed value.
pub fn encode_int(n: i64) -> BytesMut {
    encode_uint(zigzag(n))
}

/// Decodes an unsigned value from the front of `buf`.
///
/// Returns the value and the number of bytes consumed. Fails with
/// [`ProtocolError::Truncated`] when the form declared by the first byte
/// extends past the end of the buffer.
pub fn decode_uint(buf: &[u8]) -> Result<(u64, usize), ProtocolError> {
    let b0 = *buf.first().ok_or(ProtocolError::Truncated { needed: 1 })?;
    match b0 {
        0..=215 => Ok((b0 as u64, 1)),
        216..=251 => {
            let b = need(buf, 2)?;
            let value = TWO_BYTE_BASE + (b0 as u64 - TWO_BYTE_BASE) * 256 + b[1] as u64;
            Ok((value, 2))
        }
        MARKER_U16 => {
            let b = need(buf, 3)?;
            Ok((u16::from_be_bytes([b[1], b[2]]) as u64, 3))
        }
        MARKER_U24 => {
            let b = need(buf, 4)?;
            Ok((u32::from_be_bytes([0, b[1], b[2], b[3]]) as u64, 4))
        }
        MARKER_U32 => {
            let b = need(buf, 5)?;
            Ok((u32::from_be_bytes([b[1], b[2], b[3], b[4]]) as u64, 5))
        }
        MARKER_F64 => {
            let b = need(buf, 9)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&b[1..9]);
            let f = f64::from_le_bytes(raw);
            if !f.is_finite() || f < 0.0 {
                return Err(ProtocolError::InvalidFloat(f));
            }
            Ok((f.floor() as u64, 9))
        }
    }
}

/// Decodes a signed value from the front of `buf`.
pub fn decode_int(buf: &[u8]) -> Result<(i64, usize), ProtocolError> {
    let (u, read) = decode_uint(buf)?;
    Ok((unzigzag(u), read))
}

fn need(buf: &[u8], len: usize) -> Result<&[u8], ProtocolError> {
    if buf.len() < len {
        Err(ProtocolError::Truncated {
            needed: len - buf.len(),
        })
    } else {
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(buf: BytesMut) -> Vec<u8> {
        buf.to_vec()
    }

    #[test]
    fn test_zigzag_interleaves_signs() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        assert_eq!(zigzag(2), 4);
        assert_eq!(zigzag(107), 214);
        assert_eq!(zigzag(-108), 215);
    }

    #[test]
    fn test_zigzag_roundtrip() {
        for n in -1000..=1000i64 {
            assert_eq!(unzigzag(zigzag(n)), n);
        }
        for n in [
            i64::MIN,
            i64::MAX,
            -(1 << 52),
            1 << 52,
            -123_456_789,
            123_456_789,
        ] {
            assert_eq!(unzigzag(zigzag(n)), n);
        }
    }

    #[test]
    fn test_signed_boundary_vectors() {
        assert_eq!(bytes_of(encode_int(0)), [0x00]);
        assert_eq!(bytes_of(encode_int(1)), [0x02]);
        assert_eq!(bytes_of(encode_int(-1)), [0x01]);
        assert_eq!(bytes_of(encode_int(100)), [0xC8]);
        assert_eq!(bytes_of(encode_int(-100)), [0xC7]);
        assert_eq!(bytes_of(encode_int(107)), [0xD6]);
        assert_eq!(bytes_of(encode_int(108)), [0xD8, 0x00]);
    }

    #[test]
    fn test_unsigned_boundary_vectors() {
        assert_eq!(bytes_of(encode_uint(0)), [0x00]);
        assert_eq!(bytes_of(encode_uint(215)), [0xD7]);
        assert_eq!(bytes_of(encode_uint(216)), [0xD8, 0x00]);
        assert_eq!(bytes_of(encode_uint(217)), [0xD8, 0x01]);
        assert_eq!(bytes_of(encode_uint(9431)), [0xFB, 0xFF]);
        assert_eq!(bytes_of(encode_uint(9432)), [0xFC, 0x24, 0xD8]);
        assert_eq!(bytes_of(encode_uint(65535)), [0xFC, 0xFF, 0xFF]);
        assert_eq!(bytes_of(encode_uint(65536)), [0xFD, 0x01, 0x00, 0x00]);
        assert_eq!(
            bytes_of(encode_uint((1 << 24) - 1)),
            [0xFD, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            bytes_of(encode_uint(1 << 24)),
            [0xFE, 0x01, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            bytes_of(encode_uint((1 << 32) - 1)),
            [0xFE, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_float_form_for_large_values() {
        let encoded = bytes_of(encode_uint(1 << 32));
        assert_eq!(encoded.len(), 9);
        assert_eq!(encoded[0], 0xFF);
        let (value, read) = decode_uint(&encoded).unwrap();
        assert_eq!(value, 1 << 32);
        assert_eq!(read, 9);

        let (value, _) = decode_uint(&encode_uint(crate::MAX_SAFE_INTEGER)).unwrap();
        assert_eq!(value, crate::MAX_SAFE_INTEGER);
    }

    #[test]
    fn test_float_form_rejects_negative_and_non_finite() {
        let mut buf = vec![0xFFu8];
        buf.extend_from_slice(&(-1.0f64).to_le_bytes());
        assert!(matches!(
            decode_uint(&buf),
            Err(ProtocolError::InvalidFloat(_))
        ));

        let mut buf = vec![0xFFu8];
        buf.extend_from_slice(&f64::NAN.to_le_bytes());
        assert!(matches!(
            decode_uint(&buf),
            Err(ProtocolError::InvalidFloat(_))
        ));
    }

    #[test]
    fn test_prescribed_lengths_and_first_bytes() {
        let cases: &[(u64, usize, std::ops::RangeInclusive<u8>)] = &[
            (0, 1, 0..=215),
            (215, 1, 0..=215),
            (216, 2, 216..=251),
            (5000, 2, 216..=251),
            (9431, 2, 216..=251),
            (9432, 3, 252..=252),
            (65535, 3, 252..=252),
            (65536, 4, 253..=253),
            ((1 << 24) - 1, 4, 253..=253),
            (1 << 24, 5, 254..=254),
            ((1 << 32) - 1, 5, 254..=254),
            (1 << 32, 9, 255..=255),
        ];
        for (value, len, first) in cases {
            let encoded = bytes_of(encode_uint(*value));
            assert_eq!(encoded.len(), *len, "length of {value}");
            assert!(first.contains(&encoded[0]), "first byte of {value}");
        }
    }

    #[test]
    fn test_unsigned_roundtrip() {
        let mut values: Vec<u64> = (0..=10_000).collect();
        values.extend([
            65_535,
            65_536,
            1 << 20,
            (1 << 24) - 1,
            1 << 24,
            (1 << 32) - 1,
            1 << 32,
            crate::MAX_SAFE_INTEGER,
        ]);
        for n in values {
            let encoded = encode_uint(n);
            let (decoded, read) = decode_uint(&encoded).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(read, encoded.len());
        }
    }

    #[test]
    fn test_signed_roundtrip() {
        let mut values: Vec<i64> = (-5000..=5000).collect();
        values.extend([-(1 << 52), 1 << 52, -(1 << 31), 1 << 31]);
        for n in values {
            let encoded = encode_int(n);
            let (decoded, read) = decode_int(&encoded).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(read, encoded.len());
        }
    }

    #[test]
    fn test_encodings_order_lexicographically_on_small_values() {
        // Length-then-lexicographic comparison preserves value order.
        let first = bytes_of(encode_uint(0));
        let mut previous = (first.len(), first);
        for n in 1..=10_000u64 {
            let encoded = bytes_of(encode_uint(n));
            let key = (encoded.len(), encoded);
            assert!(previous < key, "encoding of {n} does not sort above {}", n - 1);
            previous = key;
        }
    }

    #[test]
    fn test_truncation_of_every_multibyte_form() {
        for value in [216u64, 9432, 65536, 1 << 24, 1 << 32] {
            let encoded = bytes_of(encode_uint(value));
            for keep in 0..encoded.len() {
                assert!(
                    matches!(
                        decode_uint(&encoded[..keep]),
                        Err(ProtocolError::Truncated { .. })
                    ),
                    "prefix of length {keep} of {value} should be truncated"
                );
            }
        }
    }

    #[test]
    fn test_empty_input_is_truncated() {
        assert!(matches!(
            decode_uint(&[]),
            Err(ProtocolError::Truncated { needed: 1 })
        ));
    }

    #[test]
    fn test_streaming_concatenation() {
        let values: [i64; 8] = [0, -1, 107, 108, 9431, -9431, 1 << 20, -(1 << 33)];
        let mut buf = BytesMut::new();
        for n in values {
            put_int(&mut buf, n);
        }
        let mut rest = &buf[..];
        for n in values {
            let (decoded, read) = decode_int(rest).unwrap();
            assert_eq!(decoded, n);
            rest = &rest[read..];
        }
        assert!(rest.is_empty());
    }

    #[test]
    fn test_reencode_is_byte_identical() {
        for n in [0u64, 215, 216, 9431, 9432, 65535, 65536, 1 << 24, 1 << 32] {
            let first = bytes_of(encode_uint(n));
            let (decoded, _) = decode_uint(&first).unwrap();
            assert_eq!(bytes_of(encode_uint(decoded)), first);
        }
    }
}
