//! Unsigned LEB128-style varints (little-endian base-128).
//!
//! 7-bit groups emitted low-to-high with the continuation bit (`0x80`)
//! set on every byte except the last. A `u32` never needs more than
//! 5 bytes; a decoder that has consumed 5 continuation bytes is reading
//! garbage and must stop rather than shift forever.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{LarkError, Result};

/// Maximum encoded length of a `u32` varuint.
pub const MAX_VARUINT_BYTES: usize = 5;

/// Append `value` to `buf` in varuint encoding.
pub fn write_varuint(buf: &mut Vec<u8>, value: u32) {
    let mut v = value;
    while v >= 0x80 {
        buf.push((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Encode `value` as a standalone varuint.
pub fn encode_varuint(value: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_VARUINT_BYTES);
    write_varuint(&mut buf, value);
    buf
}

/// Number of bytes `write_varuint` will emit for `value`.
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0xfff_ffff => 4,
        _ => 5,
    }
}

/// Decode one varuint from `reader`.
///
/// # Errors
/// - [`LarkError::EndOfStream`] if the source is exhausted mid-value.
/// - [`LarkError::MalformedVarint`] if no terminating byte appears
///   within [`MAX_VARUINT_BYTES`].
pub async fn read_varuint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u32> {
    let mut result = 0u32;
    let mut shift = 0u32;

    while shift < 32 {
        let byte = reader.read_u8().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                LarkError::EndOfStream
            } else {
                LarkError::Io(e)
            }
        })?;
        result |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }

    Err(LarkError::MalformedVarint)
}
