//! Energy-based end-of-utterance detection.
//!
//! ## Algorithm
//!
//! 1. Frame energy = mean |sample| over little-endian PCM16 pairs.
//! 2. Loud frame → record `last_sound`; start an episode if idle.
//! 3. Quiet frame while speaking → once `now - last_sound` reaches
//!    `silence_duration`, end the episode; emit end-of-utterance only if
//!    the episode lasted at least `min_speech_duration`.
//! 4. Quiet frame while idle → nothing.
//!
//! At most one event fires per speech episode.

use std::time::{Duration, Instant};

use tracing::trace;

/// PCM16 full-scale magnitude; thresholds are specified in [0, 1] and
/// compared against `threshold * 32768`.
const FULL_SCALE: f32 = 32768.0;

/// Classifies successive audio frames as speech/silence and emits an
/// end-of-utterance event when a long-enough speech episode is followed
/// by enough silence.
///
/// Owned by exactly one audio-processing flow; no internal locking.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    /// Mean-absolute-amplitude threshold in [0, 1].
    threshold: f32,
    /// Silence run length that ends a speech episode.
    silence_duration: Duration,
    /// Minimum episode length for an end-of-utterance event; shorter
    /// episodes are discarded silently.
    min_speech_duration: Duration,
    last_sound: Option<Instant>,
    speech_start: Option<Instant>,
    is_speaking: bool,
}

impl SilenceDetector {
    /// # Parameters
    /// - `threshold`: energy level above which a frame counts as sound.
    ///   Default: `0.008`.
    /// - `silence_duration_ms`: silence run that ends an episode.
    ///   Default: `1200`.
    /// - `min_speech_duration_ms`: shortest episode that produces an
    ///   event. Default: `500`.
    pub fn new(threshold: f32, silence_duration_ms: u64, min_speech_duration_ms: u64) -> Self {
        Self {
            threshold,
            silence_duration: Duration::from_millis(silence_duration_ms),
            min_speech_duration: Duration::from_millis(min_speech_duration_ms),
            last_sound: None,
            speech_start: None,
            is_speaking: false,
        }
    }

    /// Clear all episode state. Call when a fresh listening episode
    /// begins (e.g. right after a wake event) so stale timestamps from a
    /// previous utterance cannot leak in.
    pub fn reset(&mut self) {
        self.last_sound = None;
        self.speech_start = None;
        self.is_speaking = false;
    }

    pub fn is_speaking(&self) -> bool {
        self.is_speaking
    }

    /// Classify one frame of little-endian PCM16 bytes against the wall
    /// clock. Returns `true` exactly when a speech episode just ended
    /// and was long enough to count as an utterance.
    pub fn process(&mut self, audio: &[u8]) -> bool {
        self.process_at(audio, Instant::now())
    }

    /// [`process`](Self::process) with an explicit timestamp, for tests
    /// and for replaying recorded audio on a synthetic clock. `now` must
    /// be monotonically non-decreasing across calls.
    pub fn process_at(&mut self, audio: &[u8], now: Instant) -> bool {
        if self.is_silent(audio) {
            if let (true, Some(last_sound)) = (self.is_speaking, self.last_sound) {
                if now.duration_since(last_sound) >= self.silence_duration {
                    self.is_speaking = false;
                    let episode = self
                        .speech_start
                        .map(|start| last_sound.duration_since(start));
                    trace!(?episode, "speech episode ended");
                    if episode.is_some_and(|d| d >= self.min_speech_duration) {
                        return true;
                    }
                    // Too short to be an utterance — discard silently.
                }
            }
        } else {
            self.last_sound = Some(now);
            if !self.is_speaking {
                self.is_speaking = true;
                self.speech_start = Some(now);
            }
        }

        false
    }

    /// Mean absolute amplitude below threshold. Degenerate input (fewer
    /// than 2 bytes) is silence; an odd trailing byte is ignored.
    fn is_silent(&self, audio: &[u8]) -> bool {
        if audio.len() < 2 {
            return true;
        }

        let mut sum = 0u64;
        let mut count = 0u32;
        for pair in audio.chunks_exact(2) {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            sum += u64::from(sample.unsigned_abs());
            count += 1;
        }

        let volume = sum as f32 / count as f32;
        volume < self.threshold * FULL_SCALE
    }
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self::new(0.008, 1200, 500)
    }
}
