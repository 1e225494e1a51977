//! Inference backend implementations
//!
//! The registry loads artifacts through the `ArtifactLoader` seam; this module
//! provides the concrete loaders:
//! - Tract backend (pure Rust, no external dependencies)
//! - Mock artifacts and loaders for testing

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

// Re-export backends based on enabled features
#[cfg(feature = "tract")]
pub use self::tract::TractLoader;
