#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Sortium
//!
//! A serving core for image classification with an optional background-removal
//! pre-stage, built for waste-sorting deployments: one expensive model artifact
//! is loaded lazily exactly once and shared across concurrent requests, images
//! are preprocessed to match the artifact's training-time transform, and raw
//! scores are decoded against a caller-supplied label vocabulary.
//!
//! The crate deliberately stops below the HTTP layer. A web framework parses
//! multipart uploads and maps routes; this crate provides the byte-oriented
//! request pipeline that those handlers call.
//!
//! ## Features
//!
//! - **Lazy single-flight loading**: N concurrent first requests trigger
//!   exactly one artifact load; failures latch until an explicit reset
//! - **Declared preprocessing**: resize and normalization come from the
//!   artifact's on-disk descriptor, never guessed from the model
//! - **Deterministic decoding**: argmax with lowest-index tie-break
//! - **Bounded result store**: background-removal outputs live behind opaque
//!   handles with count- and age-based eviction
//! - **Pure Rust inference**: Tract backend (enable with `tract`, default)
//! - **CLI Integration**: command-line interface (enable with `cli`, default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sortium::{
//!     FnRemover, RequestOrchestrator, ServiceConfig, TractLoader,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> sortium::Result<()> {
//! let config = ServiceConfig::builder()
//!     .artifact_dir("/srv/models/garbage_model")
//!     .build()?;
//!
//! // Background removal is a black-box collaborator; wire in any
//! // implementation of `BackgroundRemover`.
//! let remover = Arc::new(FnRemover::new(|image| image));
//!
//! let orchestrator = RequestOrchestrator::new(&config, Arc::new(TractLoader::new()), remover)?;
//!
//! let upload = std::fs::read("garbage.jpg")?;
//! let result = orchestrator
//!     .classify(
//!         "garbage.jpg",
//!         &upload,
//!         &["['battery', 'glass', 'paper']".to_string()],
//!     )
//!     .await?;
//! println!("{} ({}%)", result.label, result.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! ## Library-Only Usage
//!
//! To use only as a library without CLI dependencies:
//!
//! ```toml
//! [dependencies]
//! sortium = { version = "0.2", default-features = false, features = ["tract"] }
//! ```

pub mod artifact;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod inference;
pub mod labels;
pub mod orchestrator;
pub mod preprocess;
pub mod registry;
pub mod removal;
pub mod store;
#[cfg(feature = "cli")]
pub mod tracing_config;

// Public API exports
pub use artifact::{ArtifactLoader, ArtifactSpec, LoadedArtifact, Normalization};
#[cfg(feature = "tract")]
pub use backends::TractLoader;
pub use codec::ImageCodec;
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{Result, SortiumError};
pub use inference::InferenceRunner;
pub use labels::{ClassifierSet, LabelDecoder, Prediction};
pub use orchestrator::{
    Classification, RemovalClassification, RemovedImage, RequestOrchestrator,
};
pub use preprocess::PreprocessingPipeline;
pub use registry::{LoadState, ModelRegistry};
pub use removal::{BackgroundRemover, FnRemover, RemovalStage, RemovedBackground};
pub use store::{Handle, ResultStore, StagedUpload};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
