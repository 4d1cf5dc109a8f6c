//! Voice-activity gating.
//!
//! The satellite only needs end-of-utterance detection: an energy
//! threshold over PCM16 frames plus a small episode state machine. A
//! neural VAD could slot in later behind the same surface.

pub mod silence;

pub use silence::SilenceDetector;
