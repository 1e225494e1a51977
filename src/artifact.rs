//! Artifact metadata and loading seams
//!
//! An "artifact" is the trained, serialized classification model loaded into
//! memory once and reused across requests. Each deployment ships one artifact
//! directory containing the model file plus an `artifact.json` descriptor that
//! declares the preprocessing contract (input shape and value normalization).
//! The normalization is declared, never inferred: a mismatch against the
//! training-time transform silently degrades predictions instead of crashing,
//! so it must be explicit, versioned configuration.

use crate::error::{Result, SortiumError};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Descriptor file expected inside every artifact directory
pub const DESCRIPTOR_FILE: &str = "artifact.json";

/// Value normalization applied after resize, declared per artifact family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    /// Scale raw `u8` channels to `[0, 1]`
    Scale01,
    /// Scale raw `u8` channels to `[-1, 1]` (EfficientNetV2 family)
    Signed,
    /// Per-channel mean/variance centering on `[0, 1]` values
    MeanStd {
        /// Per-channel mean subtracted after scaling to `[0, 1]`
        mean: [f32; 3],
        /// Per-channel standard deviation divided after centering
        std: [f32; 3],
    },
}

impl Normalization {
    /// Map a single raw channel value through this normalization
    #[must_use]
    pub fn apply(&self, value: u8, channel: usize) -> f32 {
        let scaled = f32::from(value) / 255.0;
        match self {
            Self::Scale01 => scaled,
            Self::Signed => scaled * 2.0 - 1.0,
            Self::MeanStd { mean, std } => {
                let m = mean.get(channel).copied().unwrap_or(0.0);
                let s = std.get(channel).copied().unwrap_or(1.0);
                (scaled - m) / s
            },
        }
    }
}

/// Static metadata for one deployable artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Human-readable artifact name for logging
    pub name: String,
    /// Model file name inside the artifact directory
    pub model_file: String,
    /// Expected spatial input size as `[height, width]`
    pub input_size: [usize; 2],
    /// Expected channel count (3 for RGB classifiers)
    pub channels: usize,
    /// Length of the output score vector
    pub num_classes: usize,
    /// Declared training-time value normalization
    pub normalization: Normalization,
}

impl ArtifactSpec {
    /// Load and validate the descriptor from an artifact directory
    ///
    /// # Errors
    /// - `ModelLoad` if the directory, descriptor, or model file is missing,
    ///   or the descriptor fails to parse or declares impossible dimensions
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(SortiumError::model_load(format!(
                "artifact folder not found: {}",
                dir.display()
            )));
        }

        let descriptor_path = dir.join(DESCRIPTOR_FILE);
        let raw = fs::read_to_string(&descriptor_path).map_err(|e| {
            SortiumError::model_load(format!(
                "failed to read descriptor '{}': {e}",
                descriptor_path.display()
            ))
        })?;
        let spec: Self = serde_json::from_str(&raw).map_err(|e| {
            SortiumError::model_load(format!(
                "invalid descriptor '{}': {e}",
                descriptor_path.display()
            ))
        })?;
        spec.validate()?;

        let model_path = dir.join(&spec.model_file);
        if !model_path.is_file() {
            return Err(SortiumError::model_load(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }
        Ok(spec)
    }

    /// Validate descriptor fields for internal consistency
    ///
    /// # Errors
    /// - `ModelLoad` on zero-sized dimensions, class counts, or channel counts
    pub fn validate(&self) -> Result<()> {
        if self.input_size[0] == 0 || self.input_size[1] == 0 {
            return Err(SortiumError::model_load(format!(
                "artifact '{}' declares a zero-area input size",
                self.name
            )));
        }
        if self.channels != 3 {
            return Err(SortiumError::model_load(format!(
                "artifact '{}' declares {} input channels; only 3-channel RGB is supported",
                self.name, self.channels
            )));
        }
        if self.num_classes == 0 {
            return Err(SortiumError::model_load(format!(
                "artifact '{}' declares zero output classes",
                self.name
            )));
        }
        Ok(())
    }

    /// Expected input shape as `(height, width, channels)`
    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize) {
        (self.input_size[0], self.input_size[1], self.channels)
    }

    /// Absolute path of the model file inside `dir`
    #[must_use]
    pub fn model_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.model_file)
    }
}

/// A loaded, immutable inference artifact
///
/// Implementations are created once by the registry and shared across requests
/// behind an `Arc`; they must never mutate after construction.
pub trait LoadedArtifact: std::fmt::Debug + Send + Sync {
    /// Descriptor this artifact was loaded from
    fn spec(&self) -> &ArtifactSpec;

    /// Run the artifact on a single-item NHWC batch and return the raw scores
    ///
    /// # Errors
    /// - `Inference` if the backend rejects the tensor, with the cause attached
    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>>;

    /// Whether concurrent `predict` calls are safe without external locking
    fn reentrant(&self) -> bool {
        true
    }
}

/// Loader seam between the registry and a concrete inference backend
///
/// The registry owns *when* the artifact is loaded; the loader owns *how*.
/// Tests inject counting or failing loaders through this trait.
pub trait ArtifactLoader: Send + Sync {
    /// Load the artifact found at `dir`
    ///
    /// This is the expensive, potentially multi-second call the registry's
    /// single-flight gate protects.
    ///
    /// # Errors
    /// - `ModelLoad` for missing or undeserializable artifacts
    fn load(&self, dir: &Path) -> Result<Arc<dyn LoadedArtifact>>;
}
