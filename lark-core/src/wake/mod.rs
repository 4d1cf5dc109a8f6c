//! Wake-word detection.
//!
//! The `WakeModel` trait decouples the sliding-window detector from any
//! specific backend (scripted stub, ONNX micro model, etc.). Backends
//! run a quantized classifier over one feature window and return the raw
//! output byte; the detector dequantizes it into a probability.
//!
//! `&mut self` on `infer` intentionally expresses that compiled models
//! are stateful (arena buffers, streaming layers). Every
//! [`WakeWordDetector`] exclusively owns its boxed model — no sharing
//! across detectors, no locking.

pub mod detector;
pub mod manifest;
pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxWakeModel;

pub use detector::WakeWordDetector;
pub use manifest::{MicroConfig, WakeWordManifest};
pub use stub::ScriptedWakeModel;

use crate::error::Result;

/// Audio geometry the micro-wake-word family is trained for.
pub const SAMPLES_PER_SECOND: u32 = 16_000;
/// One 10 ms chunk.
pub const SAMPLES_PER_CHUNK: u32 = 160;
/// Chunk rate used to convert the refractory duration into chunks.
pub const CHUNKS_PER_SECOND: f32 = SAMPLES_PER_SECOND as f32 / SAMPLES_PER_CHUNK as f32;

/// Output dequantization parameters: `p = (raw - zero_point) * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantization {
    pub scale: f32,
    pub zero_point: i32,
}

impl Quantization {
    /// Dequantize one raw output byte into a probability.
    pub fn dequantize(self, raw: u8) -> f32 {
        (f32::from(raw) - self.zero_point as f32) * self.scale
    }
}

/// Contract for quantized wake-word classifier backends.
pub trait WakeModel: Send + 'static {
    /// One-time compile/load of the model. Called lazily by the detector
    /// on first use.
    ///
    /// # Errors
    /// Returns an error if the model blob is missing or cannot be
    /// compiled. The owning detector treats this as fatal.
    fn warm_up(&mut self) -> Result<()>;

    /// Flat input tensor size. Only meaningful after `warm_up`.
    fn input_size(&self) -> usize;

    /// Output dequantization parameters. Only meaningful after `warm_up`.
    fn quantization(&self) -> Quantization;

    /// Run one feature window and return the raw quantized output byte.
    fn infer(&mut self, features: &[f32]) -> Result<u8>;
}
