//! Message envelope codec.
//!
//! ```text
//! ┌───────────┬──────────────────┬───────────────┬─────────────────┐
//! │ 0x00 (u8) │ varuint(payload) │ varuint(type) │ payload bytes   │
//! └───────────┴──────────────────┴───────────────┴─────────────────┘
//! ```
//!
//! The decoder always consumes whole frames: an unknown type ID still
//! has its payload read off the stream before being dropped, so the
//! next frame starts at a trustworthy offset.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

use super::registry::MessageRegistry;
use super::varint::{encoded_len, read_varuint, write_varuint};
use crate::error::{LarkError, Result};

/// Upper bound on a declared payload length. The length field is
/// peer-controlled; without a cap a single malicious frame header forces
/// an arbitrarily large allocation.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// One decoded wire-protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type ID from the external registry.
    pub frame_type: u32,
    /// Raw payload bytes; schema interpretation is the caller's concern.
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(frame_type: u32, payload: Vec<u8>) -> Self {
        Self {
            frame_type,
            payload,
        }
    }
}

/// Outcome of decoding one well-formed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRead {
    /// A frame with a registered type ID.
    Frame(Frame),
    /// A well-formed frame whose type is not registered. The payload has
    /// been consumed from the stream; the message is dropped.
    Skipped { frame_type: u32, len: usize },
}

/// Serialize one frame.
///
/// # Panics
/// In debug builds, if `payload` exceeds [`MAX_FRAME_LEN`]: the decoder
/// on the other side rejects such a frame, so emitting one can only
/// produce a connection our own codec would tear down.
pub fn encode_frame(frame_type: u32, payload: &[u8]) -> Vec<u8> {
    debug_assert!(
        payload.len() <= MAX_FRAME_LEN,
        "payload of {} bytes exceeds MAX_FRAME_LEN",
        payload.len()
    );
    let mut buf =
        Vec::with_capacity(1 + encoded_len(payload.len() as u32) + encoded_len(frame_type) + payload.len());
    buf.push(0x00);
    write_varuint(&mut buf, payload.len() as u32);
    write_varuint(&mut buf, frame_type);
    buf.extend_from_slice(payload);
    buf
}

/// Decode one frame from `reader`.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary (the peer hung
/// up between frames). EOF anywhere inside a frame is
/// [`LarkError::EndOfStream`]: the message sequence ended mid-unit and
/// the connection cannot be trusted further.
///
/// # Errors
/// - [`LarkError::UnsupportedIndicator`] for any indicator byte other
///   than `0x00`. Only the plaintext indicator is defined, so a stray
///   byte here means the stream is desynchronized — this is fatal to the
///   connection, never skippable.
/// - [`LarkError::FrameTooLarge`] if the declared length exceeds
///   [`MAX_FRAME_LEN`].
/// - [`LarkError::MalformedVarint`] / [`LarkError::EndOfStream`] /
///   [`LarkError::Io`] from the underlying reads.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    registry: &MessageRegistry,
) -> Result<Option<FrameRead>> {
    let indicator = match reader.read_u8().await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(LarkError::Io(e)),
    };
    if indicator != 0 {
        return Err(LarkError::UnsupportedIndicator(indicator));
    }

    let len = read_varuint(reader).await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(LarkError::FrameTooLarge { len });
    }
    let frame_type = read_varuint(reader).await?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            LarkError::EndOfStream
        } else {
            LarkError::Io(e)
        }
    })?;

    if !registry.is_known(frame_type) {
        warn!(frame_type, len, "skipping frame with unregistered type");
        return Ok(Some(FrameRead::Skipped { frame_type, len }));
    }

    Ok(Some(FrameRead::Frame(Frame::new(frame_type, payload))))
}
