//! Mock artifacts and loaders for testing pipeline behavior
//!
//! These mocks let registry, runner, and orchestrator tests run without model
//! files or a real inference backend, and expose call counters so tests can
//! verify single-flight semantics.

use crate::{
    artifact::{ArtifactLoader, ArtifactSpec, LoadedArtifact, Normalization},
    error::{Result, SortiumError},
};
use instant::Duration;
use ndarray::Array4;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock artifact returning canned scores
#[derive(Debug, Clone)]
pub struct MockArtifact {
    spec: ArtifactSpec,
    scores: Vec<f32>,
    failure: Option<String>,
    reentrant: bool,
}

impl MockArtifact {
    /// Artifact with `num_classes` classes; scores descend from index 0 and sum to 1
    #[must_use]
    pub fn with_classes(num_classes: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let raw: Vec<f32> = (0..num_classes).map(|i| (num_classes - i) as f32).collect();
        let total: f32 = raw.iter().sum();
        Self::with_scores(raw.into_iter().map(|v| v / total).collect())
    }

    /// Artifact returning exactly `scores`
    #[must_use]
    pub fn with_scores(scores: Vec<f32>) -> Self {
        Self {
            spec: ArtifactSpec {
                name: "mock-classifier".to_string(),
                model_file: "model.onnx".to_string(),
                input_size: [224, 224],
                channels: 3,
                num_classes: scores.len(),
                normalization: Normalization::Signed,
            },
            scores,
            failure: None,
            reentrant: true,
        }
    }

    /// Artifact whose `predict` always fails with `message`
    #[must_use]
    pub fn failing(message: &str) -> Self {
        let mut artifact = Self::with_classes(2);
        artifact.failure = Some(message.to_string());
        artifact
    }

    /// Mark the artifact as unsafe for concurrent inference
    #[must_use]
    pub fn non_reentrant(mut self) -> Self {
        self.reentrant = false;
        self
    }

    /// Override the spatial input size
    #[must_use]
    pub fn with_input_size(mut self, height: usize, width: usize) -> Self {
        self.spec.input_size = [height, width];
        self
    }
}

impl LoadedArtifact for MockArtifact {
    fn spec(&self) -> &ArtifactSpec {
        &self.spec
    }

    fn predict(&self, _input: &Array4<f32>) -> Result<Vec<f32>> {
        if let Some(message) = &self.failure {
            let cause = std::io::Error::new(std::io::ErrorKind::InvalidData, message.clone());
            return Err(SortiumError::inference_with_source(
                "mock backend rejected tensor",
                cause,
            ));
        }
        Ok(self.scores.clone())
    }

    fn reentrant(&self) -> bool {
        self.reentrant
    }
}

/// Loader that counts calls and optionally sleeps to widen race windows
pub struct CountingLoader {
    artifact: MockArtifact,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingLoader {
    /// Loader that returns a clone of `artifact` on every load
    #[must_use]
    pub fn new(artifact: MockArtifact) -> Self {
        Self {
            artifact,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` inside each load
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of load calls observed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactLoader for CountingLoader {
    fn load(&self, _dir: &Path) -> Result<Arc<dyn LoadedArtifact>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(Arc::new(self.artifact.clone()))
    }
}

/// Loader that always fails with the same reason, counting attempts
pub struct FailingLoader {
    message: String,
    calls: AtomicUsize,
}

impl FailingLoader {
    /// Loader failing with `message`
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of load calls observed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactLoader for FailingLoader {
    fn load(&self, _dir: &Path) -> Result<Arc<dyn LoadedArtifact>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SortiumError::model_load(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_scores_sum_to_one() {
        let artifact = MockArtifact::with_classes(10);
        let tensor = Array4::<f32>::zeros((1, 224, 224, 3));
        let scores = artifact.predict(&tensor).unwrap();
        assert_eq!(scores.len(), 10);
        let total: f32 = scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        // Descending scores make argmax deterministic at index 0.
        assert!(scores[0] > scores[9]);
    }

    #[test]
    fn test_failing_artifact_attaches_source() {
        let artifact = MockArtifact::failing("boom");
        let tensor = Array4::<f32>::zeros((1, 224, 224, 3));
        let err = artifact.predict(&tensor).unwrap_err();
        assert!(std::error::Error::source(&err).is_some());
    }
}
