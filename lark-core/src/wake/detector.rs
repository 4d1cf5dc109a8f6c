//! Sliding-window wake-word detector.
//!
//! A single high per-frame probability is not trustworthy evidence of a
//! wake word, so per-chunk probabilities are averaged over a bounded
//! window before the cutoff is applied, and a refractory cooldown keeps
//! one spoken wake word from firing repeatedly as the window slides
//! across it.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::error::{LarkError, Result};
use crate::wake::{WakeModel, WakeWordManifest, CHUNKS_PER_SECOND};

/// Cooldown after a detection, in seconds of audio.
const REFRACTORY_SECONDS: f32 = 0.3;

enum ModelState {
    Cold,
    Ready,
    Failed,
}

/// Per-model stateful classifier over streamed feature vectors.
///
/// Owned by exactly one audio-processing flow; no internal locking.
pub struct WakeWordDetector {
    id: String,
    wake_word: String,
    model: Box<dyn WakeModel>,
    state: ModelState,
    probability_cutoff: f32,
    sliding_window_size: usize,
    feature_step_size: usize,
    /// Bounded FIFO of recent probabilities. Pre-allocated at exactly
    /// `sliding_window_size`; eviction before insertion keeps it from
    /// ever reallocating.
    probabilities: VecDeque<f32>,
    refractory_counter: u32,
    refractory_chunks: u32,
}

impl std::fmt::Debug for WakeWordDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeWordDetector")
            .field("id", &self.id)
            .field("wake_word", &self.wake_word)
            .field("probability_cutoff", &self.probability_cutoff)
            .field("sliding_window_size", &self.sliding_window_size)
            .field("feature_step_size", &self.feature_step_size)
            .field("refractory_counter", &self.refractory_counter)
            .field("refractory_chunks", &self.refractory_chunks)
            .finish_non_exhaustive()
    }
}

impl WakeWordDetector {
    /// Build a detector from a model descriptor. The compiled model is
    /// lazily initialized on the first [`process_chunk`](Self::process_chunk).
    pub fn from_manifest(
        id: impl Into<String>,
        manifest: &WakeWordManifest,
        model: Box<dyn WakeModel>,
    ) -> Result<Self> {
        Self::new(
            id,
            manifest.wake_word.clone(),
            model,
            manifest.micro.probability_cutoff,
            manifest.micro.sliding_window_size,
            manifest.micro.feature_step_size,
        )
    }

    /// Build a detector from explicit tuning.
    ///
    /// # Errors
    /// [`LarkError::ModelLoad`] when `sliding_window_size` or
    /// `feature_step_size` is 0. A zero-length window could never fill,
    /// so `classify` would return `false` forever without ever erroring.
    pub fn new(
        id: impl Into<String>,
        wake_word: impl Into<String>,
        model: Box<dyn WakeModel>,
        probability_cutoff: f32,
        sliding_window_size: usize,
        feature_step_size: usize,
    ) -> Result<Self> {
        let wake_word = wake_word.into();
        if sliding_window_size == 0 {
            return Err(LarkError::ModelLoad(format!(
                "detector for {wake_word:?} has sliding_window_size 0"
            )));
        }
        if feature_step_size == 0 {
            return Err(LarkError::ModelLoad(format!(
                "detector for {wake_word:?} has feature_step_size 0"
            )));
        }

        Ok(Self {
            id: id.into(),
            wake_word,
            model,
            state: ModelState::Cold,
            probability_cutoff,
            sliding_window_size,
            feature_step_size,
            probabilities: VecDeque::with_capacity(sliding_window_size),
            refractory_counter: 0,
            refractory_chunks: (REFRACTORY_SECONDS * CHUNKS_PER_SECOND) as u32,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    /// Process one chunk's feature vector; `true` means the wake word
    /// was just detected.
    ///
    /// # Errors
    /// - [`LarkError::ModelLoad`] if lazy initialization failed — the
    ///   detector stays failed on every later call; a silently dead
    ///   detector would never wake.
    /// - [`LarkError::FeatureShape`] if
    ///   `features.len() * feature_step_size` does not equal the model's
    ///   flat input size. A mismatch is a wiring bug between the feature
    ///   frontend and the model, never a soft `false`.
    pub fn process_chunk(&mut self, features: &[f32]) -> Result<bool> {
        if features.is_empty() {
            return Ok(false);
        }

        self.ensure_ready()?;

        let expected = self.model.input_size();
        if features.len() * self.feature_step_size != expected {
            return Err(LarkError::FeatureShape {
                len: features.len(),
                stride: self.feature_step_size,
                expected,
            });
        }

        let raw = self.model.infer(features)?;
        let probability = self.model.quantization().dequantize(raw);
        Ok(self.classify(probability))
    }

    /// Window/refractory state machine over one dequantized probability.
    fn classify(&mut self, probability: f32) -> bool {
        if self.refractory_counter > 0 {
            self.refractory_counter -= 1;
            return false;
        }

        if self.probabilities.len() == self.sliding_window_size {
            self.probabilities.pop_front();
        }
        self.probabilities.push_back(probability);

        let full = self.probabilities.len() == self.sliding_window_size;
        let detected = full && self.window_mean() > self.probability_cutoff;
        if detected {
            info!(
                id = %self.id,
                wake_word = %self.wake_word,
                "wake word detected"
            );
            self.probabilities.clear();
            self.refractory_counter = self.refractory_chunks;
        }
        detected
    }

    fn window_mean(&self) -> f32 {
        self.probabilities.iter().sum::<f32>() / self.probabilities.len() as f32
    }

    /// Clear the window and refractory counter (used when listening is
    /// disabled and re-enabled).
    pub fn reset(&mut self) {
        self.probabilities.clear();
        self.refractory_counter = 0;
    }

    fn ensure_ready(&mut self) -> Result<()> {
        match self.state {
            ModelState::Ready => Ok(()),
            ModelState::Failed => Err(LarkError::ModelLoad(format!(
                "wake model for {:?} previously failed to initialize",
                self.wake_word
            ))),
            ModelState::Cold => match self.model.warm_up() {
                Ok(()) => {
                    debug!(id = %self.id, "wake model initialized");
                    self.state = ModelState::Ready;
                    Ok(())
                }
                Err(e) => {
                    self.state = ModelState::Failed;
                    Err(e)
                }
            },
        }
    }
}
