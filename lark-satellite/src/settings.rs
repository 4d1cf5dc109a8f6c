//! Persistent satellite settings (JSON file next to the binary or at an
//! explicit `--config` path).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use lark_core::DEFAULT_PORT;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct SatelliteSettings {
    /// Control-protocol listen port.
    pub port: u16,
    /// Message-type IDs the application interprets; everything else is
    /// consumed and dropped by the codec.
    pub known_message_types: Vec<u32>,
    /// Silence-detector energy threshold in [0, 1].
    pub silence_threshold: f32,
    pub silence_duration_ms: u64,
    pub min_speech_duration_ms: u64,
    /// Wake-word manifest to load, relative to `models_dir`.
    pub active_wake_word: Option<String>,
    pub models_dir: Option<PathBuf>,
}

impl Default for SatelliteSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            known_message_types: vec![1, 2, 3, 12, 90],
            silence_threshold: 0.008,
            silence_duration_ms: 1200,
            min_speech_duration_ms: 500,
            active_wake_word: None,
            models_dir: None,
        }
    }
}

impl SatelliteSettings {
    /// Where the active wake word's manifest lives: `<models_dir>/<name>.json`,
    /// with `models_dir` defaulting to `models/`. `None` when no wake word
    /// is configured.
    pub fn wake_manifest_path(&self) -> Option<PathBuf> {
        let name = self.active_wake_word.as_deref()?;
        let dir = self
            .models_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("models"));
        Some(dir.join(format!("{name}.json")))
    }

    /// Clamp out-of-range values from hand-edited files.
    pub fn normalize(&mut self) {
        self.silence_threshold = self.silence_threshold.clamp(0.0, 1.0);
        if self.min_speech_duration_ms > self.silence_duration_ms {
            warn!(
                "minSpeechDurationMs {} exceeds silenceDurationMs {}; utterances may be rare",
                self.min_speech_duration_ms, self.silence_duration_ms
            );
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    PathBuf::from("lark-satellite.json")
}

/// Load settings from `path`, falling back to defaults when the file is
/// missing. A present-but-unreadable file is an error; a silently
/// ignored typo'd config is worse than a startup failure.
pub fn load_settings(path: &Path) -> anyhow::Result<SatelliteSettings> {
    if !path.exists() {
        return Ok(SatelliteSettings::default());
    }
    let text = fs::read_to_string(path)?;
    let mut settings: SatelliteSettings = serde_json::from_str(&text)?;
    settings.normalize();
    Ok(settings)
}
