//! # lark-core
//!
//! Voice-satellite core: framed wire protocol + wake detection pipeline.
//!
//! ## Architecture
//!
//! ```text
//! TcpListener → Server ──accept──► ClientConnection ──► broadcast::Sender<Frame>
//!                  │                     ▲
//!                  └───── send(frame) ───┘   (current connection register)
//!
//! PCM16 chunks ──► SilenceDetector ──► end-of-utterance bool
//! feature vecs ──► WakeWordDetector ─► wake bool (sliding window + refractory)
//! ```
//!
//! A `Server` owns at most one live connection at a time; a new client
//! replaces (and closes) the previous one. Detectors are synchronous and
//! single-owner — they carry no internal locking.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod events;
pub mod protocol;
pub mod server;
pub mod vad;
pub mod wake;

// Convenience re-exports for downstream crates
pub use error::LarkError;
pub use protocol::{encode_frame, Frame, MessageRegistry};
pub use server::{ClientConnection, Server, DEFAULT_PORT};
pub use vad::SilenceDetector;
pub use wake::{Quantization, ScriptedWakeModel, WakeModel, WakeWordDetector, WakeWordManifest};

#[cfg(feature = "onnx")]
pub use wake::OnnxWakeModel;
