//! Error types for the classification serving pipeline

use thiserror::Error;

/// Result type alias for classification pipeline operations
pub type Result<T> = std::result::Result<T, SortiumError>;

/// Comprehensive error types for the classification pipeline
///
/// Variants map one-to-one onto the failure classes callers must be able to
/// distinguish: input validation problems never touch shared state, model-load
/// failures are latched by the registry, and inference failures carry their
/// underlying cause.
#[derive(Error, Debug)]
pub enum SortiumError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or processing errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Structurally invalid request input (missing file, empty filename,
    /// undecodable image, malformed classifier list)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller-supplied classifier list does not match the artifact's class count
    #[error("Classifier mismatch: artifact produces {expected} scores but {got} labels were supplied")]
    ClassifierMismatch {
        /// Number of scores the artifact produces
        expected: usize,
        /// Number of labels the caller supplied
        got: usize,
    },

    /// Artifact loading or deserialization errors
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Artifact rejected a well-formed tensor during inference
    #[error("Inference error: {message}")]
    Inference {
        /// Human-readable failure description
        message: String,
        /// Underlying backend failure, when available
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Unknown or evicted retrieval handle
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure to persist a background-removal result
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable failure description
        message: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SortiumError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new model load error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference error without an underlying source
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a new inference error wrapping the underlying backend failure
    pub fn inference_with_source<S, E>(msg: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Inference {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new not-found error for a retrieval handle
    pub fn not_found<S: Into<String>>(handle: S) -> Self {
        Self::NotFound(handle.into())
    }

    /// Create a new storage error with I/O context
    pub fn storage<S: Into<String>>(msg: S, source: std::io::Error) -> Self {
        Self::Storage {
            message: msg.into(),
            source,
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error reflects a problem with the request rather than the service
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::ClassifierMismatch { .. } | Self::NotFound(_)
        )
    }
}
