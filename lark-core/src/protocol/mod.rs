//! Framed wire protocol.
//!
//! One frame on the wire is `0x00 | varuint(payload_len) | varuint(type) |
//! payload`. Only indicator `0x00` (plaintext) is defined; anything else
//! means the stream is desynchronized and the connection must be failed.
//! Unknown *type* IDs, by contrast, are consumed and dropped so that
//! newer peers can speak to older satellites.

pub mod frame;
pub mod registry;
pub mod varint;

pub use frame::{encode_frame, read_frame, Frame, FrameRead};
pub use registry::MessageRegistry;
pub use varint::{encode_varuint, encoded_len, read_varuint, write_varuint};
