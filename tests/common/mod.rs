//! Shared fixtures for integration tests

// Each integration test binary compiles this module independently and uses a
// different subset of it.
#![allow(dead_code)]
// `pub` here is scoped to each test binary, so the crate-wide
// `unreachable_pub` lint would otherwise fire.
#![allow(unreachable_pub)]

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use ndarray::Array4;
use sortium::{
    ArtifactLoader, ArtifactSpec, FnRemover, ImageCodec, LoadedArtifact, Normalization,
    RequestOrchestrator, Result, ServiceConfig, SortiumError,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fixed-score artifact used across integration scenarios
#[derive(Debug, Clone)]
pub struct FixtureArtifact {
    spec: ArtifactSpec,
    scores: Vec<f32>,
}

impl FixtureArtifact {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            spec: ArtifactSpec {
                name: "fixture-classifier".to_string(),
                model_file: "model.onnx".to_string(),
                input_size: [32, 32],
                channels: 3,
                num_classes: scores.len(),
                normalization: Normalization::Signed,
            },
            scores,
        }
    }
}

impl LoadedArtifact for FixtureArtifact {
    fn spec(&self) -> &ArtifactSpec {
        &self.spec
    }

    fn predict(&self, _input: &Array4<f32>) -> Result<Vec<f32>> {
        Ok(self.scores.clone())
    }
}

/// Loader handing out clones of a fixture artifact, counting calls
pub struct FixtureLoader {
    artifact: FixtureArtifact,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixtureLoader {
    pub fn new(artifact: FixtureArtifact) -> Self {
        Self {
            artifact,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactLoader for FixtureLoader {
    fn load(&self, _dir: &Path) -> Result<Arc<dyn LoadedArtifact>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(Arc::new(self.artifact.clone()))
    }
}

/// Loader that always fails the same way
pub struct BrokenLoader {
    calls: AtomicUsize,
}

impl BrokenLoader {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactLoader for BrokenLoader {
    fn load(&self, dir: &Path) -> Result<Arc<dyn LoadedArtifact>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SortiumError::model_load(format!(
            "artifact folder not found: {}",
            dir.display()
        )))
    }
}

/// Orchestrator wired with fixture collaborators
pub fn fixture_orchestrator(loader: Arc<dyn ArtifactLoader>) -> RequestOrchestrator {
    let config = ServiceConfig::builder()
        .artifact_dir("/tmp/fixture-artifact")
        .store_capacity(16)
        .store_ttl(Duration::from_secs(300))
        .build()
        .unwrap();
    // Fixture remover makes the whole image half-transparent so removal
    // output is distinguishable from the input.
    let remover = Arc::new(FnRemover::new(|mut img: RgbaImage| {
        for pixel in img.pixels_mut() {
            *pixel = Rgba([pixel[0], pixel[1], pixel[2], 128]);
        }
        img
    }));
    RequestOrchestrator::new(&config, loader, remover).unwrap()
}

/// Encode a solid-color RGB test image as PNG upload bytes
pub fn png_upload(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 140, 200])));
    ImageCodec::encode_png(&image).unwrap()
}
