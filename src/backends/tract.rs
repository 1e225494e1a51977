//! Tract backend implementation for classification artifacts
//!
//! Loads ONNX classification models through Tract, a pure Rust neural network
//! inference library with no external dependencies. Tract offers several
//! advantages for a serving core:
//! - Pure Rust implementation (no C++ dependencies)
//! - Lightweight and portable
//! - Memory safe without FFI boundaries

use crate::{
    artifact::{ArtifactLoader, ArtifactSpec, LoadedArtifact},
    error::{Result, SortiumError},
};
use instant::Instant;
use ndarray::Array4;
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Classification artifact backed by an optimized Tract model
#[derive(Debug)]
pub struct TractArtifact {
    spec: ArtifactSpec,
    model: TractModel,
}

impl LoadedArtifact for TractArtifact {
    fn spec(&self) -> &ArtifactSpec {
        &self.spec
    }

    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let inference_start = Instant::now();
        let input_tensor = Tensor::from(input.clone());

        let outputs = self.model.run(tvec![input_tensor.into()]).map_err(|e| {
            SortiumError::inference(format!("Tract inference failed: {e}"))
        })?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SortiumError::inference("no output tensor found"))?
            .into_arc_tensor();

        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            SortiumError::inference(format!("failed to convert output tensor: {e}"))
        })?;

        // Output is a (1, num_classes) batch; strip the batch dimension.
        let scores: Vec<f32> = output_view.iter().copied().collect();
        log::debug!(
            "tract inference completed in {:.2}ms ({} scores)",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            scores.len()
        );
        Ok(scores)
    }

    fn reentrant(&self) -> bool {
        // Tract runnable models take &self on run and hold no mutable state.
        true
    }
}

/// Artifact loader backed by Tract
#[derive(Debug, Default)]
pub struct TractLoader;

impl TractLoader {
    /// Create a new Tract loader
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactLoader for TractLoader {
    fn load(&self, dir: &Path) -> Result<Arc<dyn LoadedArtifact>> {
        let load_start = Instant::now();
        let spec = ArtifactSpec::from_dir(dir)?;
        let model_path = spec.model_path(dir);

        log::info!(
            "loading artifact '{}' from {} (tract, pure Rust CPU)",
            spec.name,
            model_path.display()
        );

        let (height, width, channels) = spec.input_shape();
        let model = onnx()
            .model_for_path(&model_path)
            .map_err(|e| {
                SortiumError::model_load(format!(
                    "failed to load ONNX model '{}': {e}",
                    model_path.display()
                ))
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec![1, height, width, channels]),
            )
            .map_err(|e| {
                SortiumError::model_load(format!("failed to pin model input shape: {e}"))
            })?
            .into_optimized()
            .map_err(|e| SortiumError::model_load(format!("failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                SortiumError::model_load(format!("failed to create runnable model: {e}"))
            })?;

        log::info!(
            "artifact '{}' ready in {:.2}ms",
            spec.name,
            load_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(Arc::new(TractArtifact { spec, model }))
    }
}
