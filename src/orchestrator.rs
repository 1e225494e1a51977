//! Request orchestration across the pipeline stages
//!
//! The orchestrator is what an HTTP layer calls: it owns the registry, the
//! inference runner, and the removal stage, and composes them per request
//! shape. Input validation always runs before any model readiness check, so a
//! malformed upload is reported as such even when the model is broken.

use crate::{
    artifact::ArtifactLoader,
    codec::ImageCodec,
    config::ServiceConfig,
    error::{Result, SortiumError},
    inference::InferenceRunner,
    labels::{ClassifierSet, LabelDecoder, Prediction},
    preprocess::PreprocessingPipeline,
    registry::ModelRegistry,
    removal::{BackgroundRemover, RemovalStage},
    store::{Handle, ResultStore, StagedUpload},
};
use image::DynamicImage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Wire-level prediction payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Winning label
    pub label: String,
    /// Confidence as a two-decimal percentage string, e.g. `"97.31"`
    pub confidence: String,
}

impl From<Prediction> for Classification {
    fn from(prediction: Prediction) -> Self {
        Self {
            confidence: prediction.confidence_percent(),
            label: prediction.label,
        }
    }
}

/// Background-removal-plus-prediction payload
#[derive(Debug, Clone, Serialize)]
pub struct RemovalClassification {
    /// Prediction over the background-removed image
    pub prediction: Classification,
    /// Retrieval handle for the processed image
    pub handle: String,
    /// Suggested download filename for the processed image
    pub download_name: String,
}

/// Background-removal-only payload
pub struct RemovedImage {
    /// PNG bytes of the processed image (content-type `image/png`)
    pub bytes: Vec<u8>,
    /// Retrieval handle, also valid for a later download request
    pub handle: Handle,
    /// Suggested download filename
    pub download_name: String,
}

enum Staging {
    Owned(TempDir),
    Fixed(PathBuf),
}

impl Staging {
    fn path(&self) -> &std::path::Path {
        match self {
            Self::Owned(dir) => dir.path(),
            Self::Fixed(path) => path,
        }
    }
}

/// Composes the pipeline stages per request type
pub struct RequestOrchestrator {
    registry: Arc<ModelRegistry>,
    runner: InferenceRunner,
    removal: RemovalStage,
    staging: Staging,
}

impl RequestOrchestrator {
    /// Build an orchestrator from configuration plus its two injected
    /// collaborators: the artifact loader and the removal algorithm
    ///
    /// # Errors
    /// - Configuration validation failures
    /// - `Storage` if the result store or staging directory cannot be created
    pub fn new(
        config: &ServiceConfig,
        loader: Arc<dyn ArtifactLoader>,
        remover: Arc<dyn BackgroundRemover>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(ResultStore::new(config.store_capacity, config.store_ttl)?);
        let registry = Arc::new(ModelRegistry::new(
            config.artifact_dir.clone(),
            loader,
            config.load_timeout,
        ));
        let staging = match &config.staging_dir {
            Some(path) => Staging::Fixed(path.clone()),
            None => Staging::Owned(TempDir::with_prefix("sortium-uploads-").map_err(|e| {
                SortiumError::storage("failed to create upload staging directory", e)
            })?),
        };

        Ok(Self {
            registry,
            runner: InferenceRunner::new(),
            removal: RemovalStage::new(remover, store),
            staging,
        })
    }

    /// Shared model registry, for readiness probes and administrative reset
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Classify an uploaded image
    ///
    /// # Errors
    /// - `InvalidInput` / `ClassifierMismatch` for malformed requests
    /// - `ModelLoad` if the artifact is not loadable
    /// - `Inference` if the artifact rejects the tensor
    pub async fn classify(
        &self,
        filename: &str,
        bytes: &[u8],
        classifier_items: &[String],
    ) -> Result<Classification> {
        let (image, classifiers) = Self::validate_input(filename, bytes, classifier_items)?;
        let _staged = StagedUpload::stage(self.staging.path(), bytes)?;

        let prediction = self.predict(&image, &classifiers).await?;
        tracing::info!(label = %prediction.label, confidence = prediction.confidence, "classified upload");
        Ok(prediction.into())
    }

    /// Remove the background, then classify the processed image
    ///
    /// # Errors
    /// - As `classify`, plus `Storage` if the processed image cannot be stored
    pub async fn remove_and_classify(
        &self,
        filename: &str,
        bytes: &[u8],
        classifier_items: &[String],
    ) -> Result<RemovalClassification> {
        let (image, classifiers) = Self::validate_input(filename, bytes, classifier_items)?;
        let _staged = StagedUpload::stage(self.staging.path(), bytes)?;

        let removed = self.removal.remove(&image, filename)?;
        let prediction = self.predict(&removed.image, &classifiers).await?;
        tracing::info!(
            label = %prediction.label,
            handle = %removed.handle,
            "classified background-removed upload"
        );
        Ok(RemovalClassification {
            prediction: prediction.into(),
            handle: removed.handle.to_string(),
            download_name: removed.download_name,
        })
    }

    /// Remove the background and return the processed image directly
    ///
    /// The result is also registered in the store, so the returned handle
    /// honors the same download contract as `remove_and_classify`.
    ///
    /// # Errors
    /// - `InvalidInput` for malformed uploads
    /// - `Storage` if the processed image cannot be stored
    pub async fn remove_only(&self, filename: &str, bytes: &[u8]) -> Result<RemovedImage> {
        Self::validate_upload(filename, bytes)?;
        let image = ImageCodec::decode(bytes)?;
        let _staged = StagedUpload::stage(self.staging.path(), bytes)?;

        let removed = self.removal.remove(&image, filename)?;
        Ok(RemovedImage {
            bytes: removed.bytes,
            handle: removed.handle,
            download_name: removed.download_name,
        })
    }

    /// Retrieve a stored background-removal result by handle token
    ///
    /// # Errors
    /// - `InvalidInput` for malformed tokens
    /// - `NotFound` for unknown or evicted handles
    pub fn fetch_processed(&self, token: &str) -> Result<Vec<u8>> {
        let handle = Handle::parse(token)?;
        self.removal.fetch(&handle)
    }

    /// Shared predict tail: readiness, classifier-count check, preprocess,
    /// infer, decode
    async fn predict(
        &self,
        image: &DynamicImage,
        classifiers: &ClassifierSet,
    ) -> Result<Prediction> {
        let artifact = self.registry.ensure_ready().await?;
        let spec = artifact.spec();

        // Fail before preprocessing: a wrong-length label list can never
        // decode meaningfully, whatever the scores turn out to be.
        if classifiers.len() != spec.num_classes {
            return Err(SortiumError::ClassifierMismatch {
                expected: spec.num_classes,
                got: classifiers.len(),
            });
        }

        let tensor = PreprocessingPipeline::prepare(image, spec)?;
        let scores = self.runner.infer(artifact.as_ref(), &tensor)?;
        LabelDecoder::decode(&scores, classifiers)
    }

    /// Structural validation shared by the classify entry points
    fn validate_input(
        filename: &str,
        bytes: &[u8],
        classifier_items: &[String],
    ) -> Result<(DynamicImage, ClassifierSet)> {
        Self::validate_upload(filename, bytes)?;
        let image = ImageCodec::decode(bytes)?;
        let classifiers = ClassifierSet::parse_wire(classifier_items)?;
        Ok((image, classifiers))
    }

    fn validate_upload(filename: &str, bytes: &[u8]) -> Result<()> {
        if filename.is_empty() {
            return Err(SortiumError::invalid_input("no selected file"));
        }
        if bytes.is_empty() {
            return Err(SortiumError::invalid_input("no file part in request"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{CountingLoader, FailingLoader, MockArtifact};
    use crate::removal::FnRemover;
    use image::{Rgb, RgbImage};
    use std::time::Duration;

    fn png_upload(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([120, 180, 60]),
        ));
        ImageCodec::encode_png(&image).unwrap()
    }

    fn orchestrator_with(loader: Arc<dyn ArtifactLoader>) -> RequestOrchestrator {
        let config = ServiceConfig::builder()
            .artifact_dir("/tmp/test-artifact")
            .store_capacity(8)
            .store_ttl(Duration::from_secs(60))
            .build()
            .unwrap();
        let remover = Arc::new(FnRemover::new(|img| img));
        RequestOrchestrator::new(&config, loader, remover).unwrap()
    }

    fn two_class_orchestrator() -> RequestOrchestrator {
        orchestrator_with(Arc::new(CountingLoader::new(
            MockArtifact::with_classes(2).with_input_size(32, 32),
        )))
    }

    #[tokio::test]
    async fn test_classify_small_upload_scenario() {
        let orchestrator = two_class_orchestrator();
        let result = orchestrator
            .classify(
                "garbage.png",
                &png_upload(10, 10),
                &["['battery', 'glass']".to_string()],
            )
            .await
            .unwrap();

        assert!(["battery", "glass"].contains(&result.label.as_str()));
        let percent: f32 = result.confidence.parse().unwrap();
        assert!((0.0..=100.0).contains(&percent));
    }

    #[tokio::test]
    async fn test_classifier_mismatch_is_distinct_error() {
        let orchestrator = two_class_orchestrator();
        let err = orchestrator
            .classify(
                "garbage.png",
                &png_upload(10, 10),
                &["['battery', 'glass', 'paper']".to_string()],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SortiumError::ClassifierMismatch {
                expected: 2,
                got: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_input_errors_reported_before_model_readiness() {
        // The loader would fail, but a corrupt upload must short-circuit first.
        let orchestrator =
            orchestrator_with(Arc::new(FailingLoader::new("artifact folder not found")));

        let err = orchestrator
            .classify("bad.png", b"not an image", &["['a', 'b']".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SortiumError::InvalidInput(_)));
        assert_eq!(orchestrator.registry().load_count(), 0);

        let err = orchestrator
            .classify("", &png_upload(4, 4), &["['a', 'b']".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SortiumError::InvalidInput(_)));

        // Structurally valid input then surfaces the model failure.
        let err = orchestrator
            .classify("ok.png", &png_upload(4, 4), &["['a', 'b']".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SortiumError::ModelLoad(_)));
    }

    #[tokio::test]
    async fn test_remove_and_classify_returns_fetchable_handle() {
        let orchestrator = two_class_orchestrator();
        let result = orchestrator
            .remove_and_classify(
                "photo.jpeg",
                &png_upload(12, 12),
                &["['battery', 'glass']".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(result.download_name, "bg_removed_photo.png");
        let stored = orchestrator.fetch_processed(&result.handle).unwrap();
        assert!(ImageCodec::decode(&stored).is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_removals_are_independently_fetchable() {
        let orchestrator = Arc::new(two_class_orchestrator());
        let upload = png_upload(12, 12);

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let orchestrator = Arc::clone(&orchestrator);
            let upload = upload.clone();
            tasks.push(tokio::spawn(async move {
                orchestrator
                    .remove_and_classify(
                        "same.png",
                        &upload,
                        &["['battery', 'glass']".to_string()],
                    )
                    .await
                    .unwrap()
                    .handle
            }));
        }
        let first = tasks.remove(0).await.unwrap();
        let second = tasks.remove(0).await.unwrap();
        assert_ne!(first, second);
        assert!(orchestrator.fetch_processed(&first).is_ok());
        assert!(orchestrator.fetch_processed(&second).is_ok());
    }

    #[tokio::test]
    async fn test_remove_only_returns_png_bytes() {
        let orchestrator = two_class_orchestrator();
        let result = orchestrator
            .remove_only("snap.jpg", &png_upload(6, 6))
            .await
            .unwrap();
        assert_eq!(result.download_name, "bg_removed_snap.png");
        assert!(ImageCodec::decode(&result.bytes).is_ok());
        // No model load is needed for removal-only requests.
        assert_eq!(orchestrator.registry().load_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_unknown_handle_is_not_found() {
        let orchestrator = two_class_orchestrator();
        let err = orchestrator
            .fetch_processed("0123456789abcdef0123456789abcdef")
            .unwrap_err();
        assert!(matches!(err, SortiumError::NotFound(_)));
    }
}
