//! `ScriptedWakeModel` — deterministic backend for tests and demos.
//!
//! Plays back a fixed script of raw quantized outputs, repeating the
//! last value once the script runs out. Lets detector tests drive exact
//! probability sequences without any model runtime.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::{LarkError, Result};
use crate::wake::{Quantization, WakeModel};

/// Identity-style quantization over [0, 1]: raw 0 → 0.0, raw 200 → 1.0.
const SCRIPT_SCALE: f32 = 1.0 / 200.0;

pub struct ScriptedWakeModel {
    input_size: usize,
    quantization: Quantization,
    script: VecDeque<u8>,
    last: u8,
    fail_warm_up: bool,
    warmed: bool,
}

impl ScriptedWakeModel {
    /// A model expecting `input_size` flat features, emitting `script`
    /// outputs in order (then repeating the final value).
    pub fn new(input_size: usize, script: impl IntoIterator<Item = u8>) -> Self {
        let script: VecDeque<u8> = script.into_iter().collect();
        Self {
            input_size,
            quantization: Quantization {
                scale: SCRIPT_SCALE,
                zero_point: 0,
            },
            script,
            last: 0,
            fail_warm_up: false,
            warmed: false,
        }
    }

    /// Convenience: script expressed as probabilities in [0, 1].
    pub fn from_probabilities(
        input_size: usize,
        probabilities: impl IntoIterator<Item = f32>,
    ) -> Self {
        Self::new(
            input_size,
            probabilities
                .into_iter()
                .map(|p| (p.clamp(0.0, 1.0) / SCRIPT_SCALE).round() as u8),
        )
    }

    /// Make `warm_up` fail, to exercise fatal-initialization paths.
    pub fn failing(input_size: usize) -> Self {
        let mut model = Self::new(input_size, []);
        model.fail_warm_up = true;
        model
    }
}

impl WakeModel for ScriptedWakeModel {
    fn warm_up(&mut self) -> Result<()> {
        if self.fail_warm_up {
            return Err(LarkError::ModelLoad("scripted warm-up failure".into()));
        }
        debug!("ScriptedWakeModel::warm_up");
        self.warmed = true;
        Ok(())
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn quantization(&self) -> Quantization {
        self.quantization
    }

    fn infer(&mut self, _features: &[f32]) -> Result<u8> {
        if !self.warmed {
            return Err(LarkError::ModelSession(
                "infer called before warm_up".into(),
            ));
        }
        if let Some(raw) = self.script.pop_front() {
            self.last = raw;
        }
        Ok(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_script_then_repeats_last() {
        let mut model = ScriptedWakeModel::new(30, [10, 20, 30]);
        model.warm_up().unwrap();
        assert_eq!(model.infer(&[]).unwrap(), 10);
        assert_eq!(model.infer(&[]).unwrap(), 20);
        assert_eq!(model.infer(&[]).unwrap(), 30);
        assert_eq!(model.infer(&[]).unwrap(), 30);
    }

    #[test]
    fn probability_round_trip_through_quantization() {
        let mut model = ScriptedWakeModel::from_probabilities(30, [0.75]);
        model.warm_up().unwrap();
        let raw = model.infer(&[]).unwrap();
        let p = model.quantization().dequantize(raw);
        assert!((p - 0.75).abs() < 0.01, "p={p}");
    }

    #[test]
    fn failing_model_errors_on_warm_up() {
        let mut model = ScriptedWakeModel::failing(30);
        assert!(matches!(
            model.warm_up(),
            Err(LarkError::ModelLoad(_))
        ));
    }
}
