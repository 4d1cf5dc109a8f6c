//! ONNX wake-word backend.
//!
//! Runs a micro-wake-word model converted to ONNX. The network consumes
//! one flat window of streaming audio features (`[1, input_size]` f32)
//! and produces a single quantized probability byte (`[1, 1]` u8); the
//! output quantization parameters travel with the model configuration
//! because ONNX exports do not carry TFLite's tensor quantization
//! metadata.

use std::path::PathBuf;

use ndarray::Array2;
use ort::session::builder::SessionBuilder;
use ort::session::{Session, SessionInputValue};
use ort::value::Value;
use tracing::info;

use crate::error::{LarkError, Result};
use crate::wake::{Quantization, WakeModel};

/// Configuration for [`OnnxWakeModel`].
#[derive(Debug, Clone)]
pub struct OnnxWakeModelConfig {
    /// Path to the `.onnx` model file.
    pub path: PathBuf,
    /// Flat input tensor size (feature stride × features per step).
    pub input_size: usize,
    /// Output dequantization parameters from the model conversion.
    pub quantization: Quantization,
}

/// Lazily-compiled ONNX session implementing [`WakeModel`].
pub struct OnnxWakeModel {
    config: OnnxWakeModelConfig,
    session: Option<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxWakeModel {
    pub fn new(config: OnnxWakeModelConfig) -> Self {
        Self {
            config,
            session: None,
            input_name: String::new(),
            output_name: String::new(),
        }
    }
}

fn resolve_name(candidates: &[String], preferred: &[&str]) -> Option<String> {
    preferred.iter().find_map(|needle| {
        candidates
            .iter()
            .find(|name| name.eq_ignore_ascii_case(needle))
            .cloned()
    })
}

impl WakeModel for OnnxWakeModel {
    fn warm_up(&mut self) -> Result<()> {
        let path = &self.config.path;
        if !path.exists() {
            return Err(LarkError::ModelNotFound {
                path: path.clone(),
            });
        }

        let session = SessionBuilder::new()
            .map_err(|e| LarkError::ModelSession(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| LarkError::ModelSession(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();

        self.input_name = resolve_name(&input_names, &["input", "features", "x"])
            .or_else(|| input_names.first().cloned())
            .ok_or_else(|| LarkError::ModelSession("wake model has no inputs".into()))?;
        self.output_name = resolve_name(&output_names, &["output", "probability", "y"])
            .or_else(|| output_names.first().cloned())
            .ok_or_else(|| LarkError::ModelSession("wake model has no outputs".into()))?;

        info!(
            ?path,
            input = %self.input_name,
            output = %self.output_name,
            input_size = self.config.input_size,
            "wake model session ready"
        );

        self.session = Some(session);
        Ok(())
    }

    fn input_size(&self) -> usize {
        self.config.input_size
    }

    fn quantization(&self) -> Quantization {
        self.config.quantization
    }

    fn infer(&mut self, features: &[f32]) -> Result<u8> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| LarkError::ModelSession("infer called before warm_up".into()))?;

        let input = Array2::<f32>::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| LarkError::ModelSession(e.to_string()))?;
        let input_val =
            Value::from_array(input).map_err(|e: ort::Error| LarkError::ModelSession(e.to_string()))?;
        let inputs: Vec<(String, SessionInputValue<'_>)> =
            vec![(self.input_name.clone(), input_val.into())];

        let outputs = session
            .run(inputs)
            .map_err(|e| LarkError::ModelSession(e.to_string()))?;

        let output = outputs
            .get(self.output_name.as_str())
            .unwrap_or(&outputs[0]);
        let (_, data) = output
            .try_extract_tensor::<u8>()
            .map_err(|e| LarkError::ModelSession(e.to_string()))?;
        data.first()
            .copied()
            .ok_or_else(|| LarkError::ModelSession("wake model produced empty output".into()))
    }
}
