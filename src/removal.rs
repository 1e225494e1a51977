//! Background-removal pre-stage
//!
//! The removal algorithm itself is an external collaborator behind the
//! `BackgroundRemover` trait; this stage owns everything around it: RGBA
//! conversion, lossless PNG encoding, download-filename derivation, and
//! registration of the result in the bounded store.

use crate::{
    codec::ImageCodec,
    error::Result,
    store::{Handle, ResultStore},
};
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use std::sync::Arc;

/// Black-box background-removal function
///
/// Input and output are both 4-channel so the algorithm can express
/// transparency for removed regions.
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background of `image`, returning a transparent-background copy
    ///
    /// # Errors
    /// - Implementation-specific failures of the underlying algorithm
    fn remove_background(&self, image: RgbaImage) -> Result<RgbaImage>;
}

/// Adapter wrapping a plain function as a `BackgroundRemover`
pub struct FnRemover<F>(F);

impl<F> FnRemover<F>
where
    F: Fn(RgbaImage) -> RgbaImage + Send + Sync,
{
    /// Wrap `f` as a remover
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> BackgroundRemover for FnRemover<F>
where
    F: Fn(RgbaImage) -> RgbaImage + Send + Sync,
{
    fn remove_background(&self, image: RgbaImage) -> Result<RgbaImage> {
        Ok((self.0)(image))
    }
}

/// Output of the removal stage
pub struct RemovedBackground {
    /// Transparent-background image, kept decoded for follow-up classification
    pub image: DynamicImage,
    /// Lossless PNG encoding of `image`
    pub bytes: Vec<u8>,
    /// Retrieval handle under which `bytes` were stored
    pub handle: Handle,
    /// Suggested download filename, `bg_removed_<original-basename>.png`
    pub download_name: String,
}

/// Applies the removal collaborator and manages the result lifecycle
pub struct RemovalStage {
    remover: Arc<dyn BackgroundRemover>,
    store: Arc<ResultStore>,
}

impl RemovalStage {
    /// Create a stage around a removal implementation and its result store
    #[must_use]
    pub fn new(remover: Arc<dyn BackgroundRemover>, store: Arc<ResultStore>) -> Self {
        Self { remover, store }
    }

    /// Remove the background and store the encoded result
    ///
    /// # Errors
    /// - Failures of the removal collaborator
    /// - `Storage` if the result cannot be persisted
    pub fn remove(&self, image: &DynamicImage, original_name: &str) -> Result<RemovedBackground> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        tracing::debug!(size = %format!("{width}x{height}"), "removing background");

        let removed = self.remover.remove_background(rgba)?;
        let image = DynamicImage::ImageRgba8(removed);
        let bytes = ImageCodec::encode_png(&image)?;
        let handle = self.store.insert(&bytes)?;
        let download_name = download_name(original_name);
        tracing::debug!(%handle, %download_name, "stored background-removal result");

        Ok(RemovedBackground {
            image,
            bytes,
            handle,
            download_name,
        })
    }

    /// Retrieve a previously stored result
    ///
    /// # Errors
    /// - `NotFound` for unknown or evicted handles
    pub fn fetch(&self, handle: &Handle) -> Result<Vec<u8>> {
        self.store.fetch(handle)
    }
}

/// Derive the download filename from the uploaded file's basename
///
/// Only the final path component's stem is used; anything the client put in
/// front of it is dropped.
#[must_use]
pub fn download_name(original_name: &str) -> String {
    let base = Path::new(original_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("image");
    format!("bg_removed_{base}.png")
}
