//! Inference execution over a loaded artifact

use crate::{
    artifact::LoadedArtifact,
    error::{Result, SortiumError},
};
use instant::Instant;
use ndarray::Array4;
use std::sync::Mutex;

/// Feeds preprocessed tensors through a loaded artifact
///
/// The runner itself is stateless per request; the only shared piece is an
/// optional serialization gate for artifacts whose backends are not safe for
/// concurrent `predict` calls.
pub struct InferenceRunner {
    gate: Mutex<()>,
}

impl InferenceRunner {
    /// Create a new runner
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: Mutex::new(()),
        }
    }

    /// Run inference and return the raw score vector
    ///
    /// # Errors
    /// - `Inference` if the tensor shape does not match the artifact's
    ///   declared input, if the backend rejects the tensor, or if the backend
    ///   produces a score vector of unexpected length
    pub fn infer(&self, artifact: &dyn LoadedArtifact, tensor: &Array4<f32>) -> Result<Vec<f32>> {
        let spec = artifact.spec();
        let (height, width, channels) = spec.input_shape();
        let expected = [1, height, width, channels];
        if tensor.shape() != expected {
            return Err(SortiumError::inference(format!(
                "tensor shape {:?} does not match artifact input {:?}",
                tensor.shape(),
                expected
            )));
        }

        let inference_start = Instant::now();
        let scores = if artifact.reentrant() {
            artifact.predict(tensor)?
        } else {
            let _serialized = self
                .gate
                .lock()
                .map_err(|_| SortiumError::inference("inference gate poisoned"))?;
            artifact.predict(tensor)?
        };

        if scores.len() != spec.num_classes {
            return Err(SortiumError::inference(format!(
                "artifact '{}' produced {} scores, expected {}",
                spec.name,
                scores.len(),
                spec.num_classes
            )));
        }

        log::debug!(
            "inference on '{}' completed in {:.2}ms",
            spec.name,
            inference_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(scores)
    }
}

impl Default for InferenceRunner {
    fn default() -> Self {
        Self::new()
    }
}
