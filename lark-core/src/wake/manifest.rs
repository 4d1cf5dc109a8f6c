//! Wake-word model descriptor.
//!
//! Mirrors the JSON manifest shipped next to each micro-wake-word model:
//!
//! ```json
//! {
//!   "type": "micro",
//!   "wake_word": "hey lark",
//!   "author": "…",
//!   "website": "…",
//!   "model": "hey_lark.tflite",
//!   "trained_languages": ["en"],
//!   "version": 2,
//!   "micro": {
//!     "probability_cutoff": 0.97,
//!     "feature_step_size": 10,
//!     "sliding_window_size": 5,
//!     "tensor_arena_size": 22348,
//!     "minimum_esphome_version": "2024.7.0"
//!   }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LarkError, Result};

/// Immutable configuration for one wake-word model. Loaded once at
/// detector construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeWordManifest {
    /// Manifest family; `"micro"` for the models this crate runs.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display phrase, e.g. `"hey lark"`.
    pub wake_word: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub website: String,
    /// Model weights file, relative to the manifest.
    pub model: String,
    #[serde(default)]
    pub trained_languages: Vec<String>,
    pub version: u32,
    pub micro: MicroConfig,
}

/// Detection tuning block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroConfig {
    /// Mean window probability in (0, 1) required for a detection.
    pub probability_cutoff: f32,
    /// Feature stride: input rows consumed per inference step.
    pub feature_step_size: usize,
    /// Probability window length; must be > 0.
    pub sliding_window_size: usize,
    #[serde(default)]
    pub tensor_arena_size: usize,
    #[serde(default)]
    pub minimum_esphome_version: String,
}

impl WakeWordManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| LarkError::ModelLoad(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and parse a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LarkError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.micro.sliding_window_size == 0 {
            return Err(LarkError::ModelLoad(format!(
                "manifest for {:?} has sliding_window_size 0",
                self.wake_word
            )));
        }
        if self.micro.feature_step_size == 0 {
            return Err(LarkError::ModelLoad(format!(
                "manifest for {:?} has feature_step_size 0",
                self.wake_word
            )));
        }
        if !(0.0..=1.0).contains(&self.micro.probability_cutoff) {
            return Err(LarkError::ModelLoad(format!(
                "manifest for {:?} has probability_cutoff {} outside [0, 1]",
                self.wake_word, self.micro.probability_cutoff
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "micro",
        "wake_word": "hey lark",
        "author": "Lark Contributors",
        "website": "https://example.invalid",
        "model": "hey_lark.tflite",
        "trained_languages": ["en"],
        "version": 2,
        "micro": {
            "probability_cutoff": 0.97,
            "feature_step_size": 3,
            "sliding_window_size": 5,
            "tensor_arena_size": 22348,
            "minimum_esphome_version": "2024.7.0"
        }
    }"#;

    #[test]
    fn parses_full_manifest() {
        let manifest = WakeWordManifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.kind, "micro");
        assert_eq!(manifest.wake_word, "hey lark");
        assert_eq!(manifest.model, "hey_lark.tflite");
        assert_eq!(manifest.micro.sliding_window_size, 5);
        assert_eq!(manifest.micro.feature_step_size, 3);
        assert!((manifest.micro.probability_cutoff - 0.97).abs() < 1e-6);
    }

    #[test]
    fn optional_fields_default() {
        let manifest = WakeWordManifest::from_json(
            r#"{
                "type": "micro",
                "wake_word": "ok sky",
                "model": "ok_sky.tflite",
                "version": 1,
                "micro": {
                    "probability_cutoff": 0.9,
                    "feature_step_size": 3,
                    "sliding_window_size": 10
                }
            }"#,
        )
        .unwrap();
        assert!(manifest.author.is_empty());
        assert!(manifest.trained_languages.is_empty());
        assert_eq!(manifest.micro.tensor_arena_size, 0);
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = WakeWordManifest::from_json(
            r#"{
                "type": "micro",
                "wake_word": "bad",
                "model": "bad.tflite",
                "version": 1,
                "micro": {
                    "probability_cutoff": 0.9,
                    "feature_step_size": 3,
                    "sliding_window_size": 0
                }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LarkError::ModelLoad(_)));
    }

    #[test]
    fn cutoff_outside_unit_interval_is_rejected() {
        let err = WakeWordManifest::from_json(
            r#"{
                "type": "micro",
                "wake_word": "bad",
                "model": "bad.tflite",
                "version": 1,
                "micro": {
                    "probability_cutoff": 1.5,
                    "feature_step_size": 3,
                    "sliding_window_size": 5
                }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LarkError::ModelLoad(_)));
    }

    #[test]
    fn missing_file_is_model_not_found() {
        let err = WakeWordManifest::load("/nonexistent/hey.json").unwrap_err();
        assert!(matches!(err, LarkError::ModelNotFound { .. }));
    }
}
