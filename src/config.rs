//! Service configuration for the classification pipeline

use crate::error::{Result, SortiumError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default artifact load timeout; expiry is recorded as a load failure so a
/// wedged load cannot starve every request behind the single-flight gate
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Default bound on live background-removal results
pub const DEFAULT_STORE_CAPACITY: usize = 64;

/// Default retention for background-removal results
pub const DEFAULT_STORE_TTL: Duration = Duration::from_secs(15 * 60);

/// Configuration for a classification service instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Fixed per-deployment artifact directory (model file + `artifact.json`)
    pub artifact_dir: PathBuf,

    /// Upper bound on a single artifact load
    pub load_timeout: Duration,

    /// Maximum number of live background-removal results
    pub store_capacity: usize,

    /// Maximum age of a background-removal result before eviction
    pub store_ttl: Duration,

    /// Directory for per-request upload staging (None = service-owned temp dir)
    pub staging_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Create a configuration builder for fluent construction
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty artifact directory path
    /// - Zero store capacity or zero timeouts
    pub fn validate(&self) -> Result<()> {
        if self.artifact_dir.as_os_str().is_empty() {
            return Err(SortiumError::invalid_config(
                "artifact directory must not be empty",
            ));
        }
        if self.store_capacity == 0 {
            return Err(SortiumError::invalid_config(
                "store capacity must be at least 1",
            ));
        }
        if self.load_timeout.is_zero() {
            return Err(SortiumError::invalid_config(
                "load timeout must be non-zero",
            ));
        }
        if self.store_ttl.is_zero() {
            return Err(SortiumError::invalid_config("store TTL must be non-zero"));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("garbage_model"),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            store_capacity: DEFAULT_STORE_CAPACITY,
            store_ttl: DEFAULT_STORE_TTL,
            staging_dir: None,
        }
    }
}

/// Builder for `ServiceConfig`
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Set the artifact directory
    #[must_use]
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = dir.into();
        self
    }

    /// Set the artifact load timeout
    #[must_use]
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.config.load_timeout = timeout;
        self
    }

    /// Set the result store capacity
    #[must_use]
    pub fn store_capacity(mut self, capacity: usize) -> Self {
        self.config.store_capacity = capacity;
        self
    }

    /// Set the result store retention
    #[must_use]
    pub fn store_ttl(mut self, ttl: Duration) -> Self {
        self.config.store_ttl = ttl;
        self
    }

    /// Set an explicit upload staging directory
    #[must_use]
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Validation failures; see `ServiceConfig::validate`
    pub fn build(self) -> Result<ServiceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
