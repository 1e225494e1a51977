//! Image preprocessing for model inference
//!
//! The tensor produced here must match the artifact's training-time transform
//! exactly; that contract lives in the artifact descriptor (`ArtifactSpec`),
//! never in this code. Resampling uses a fixed filter so repeated calls on
//! identical input are bit-reproducible.

use crate::{
    artifact::ArtifactSpec,
    error::{Result, SortiumError},
};
use image::{imageops, DynamicImage};
use ndarray::Array4;

/// Converts decoded images into single-item NHWC batches
pub struct PreprocessingPipeline;

impl PreprocessingPipeline {
    /// Preprocess an image into the tensor the artifact expects
    ///
    /// Steps:
    /// - RGB conversion
    /// - deterministic resize to the artifact's spatial input size
    /// - declared per-artifact value normalization
    /// - expansion to a `(1, H, W, C)` batch
    ///
    /// # Errors
    /// - `InvalidInput` if the image has zero area
    /// - `ModelLoad` surfaced from descriptor validation for unsupported channel counts
    #[allow(clippy::cast_possible_truncation)]
    pub fn prepare(image: &DynamicImage, spec: &ArtifactSpec) -> Result<Array4<f32>> {
        spec.validate()?;

        let rgb = image.to_rgb8();
        let (orig_width, orig_height) = rgb.dimensions();
        if orig_width == 0 || orig_height == 0 {
            return Err(SortiumError::invalid_input(
                "image has zero area after decoding",
            ));
        }

        let (height, width, channels) = spec.input_shape();
        tracing::debug!(
            artifact = %spec.name,
            from = %format!("{orig_width}x{orig_height}"),
            to = %format!("{width}x{height}"),
            "preprocessing image"
        );

        // Triangle filtering is deterministic for a given input, which keeps
        // preprocessing bit-reproducible across calls and platforms.
        let resized = imageops::resize(
            &rgb,
            width as u32,
            height as u32,
            imageops::FilterType::Triangle,
        );

        let mut tensor = Array4::<f32>::zeros((1, height, width, channels));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for (c, &value) in pixel.0.iter().enumerate() {
                tensor[[0, y as usize, x as usize, c]] = spec.normalization.apply(value, c);
            }
        }
        Ok(tensor)
    }
}
