//! Image decoding and encoding for the request pipeline
//!
//! All uploads enter the pipeline as raw bytes and are normalized to a
//! `DynamicImage` here; responses that carry image data are encoded back to
//! PNG, which is lossless and preserves the alpha channel produced by the
//! background-removal stage.

use crate::error::{Result, SortiumError};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Codec boundary between wire bytes and in-memory images
pub struct ImageCodec;

impl ImageCodec {
    /// Decode raw upload bytes into an image
    ///
    /// Corrupt or unrecognized data is an input validation failure, not an
    /// internal error: the bytes came straight from the caller.
    ///
    /// # Errors
    /// - `InvalidInput` if the bytes cannot be decoded as a supported image format
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(SortiumError::invalid_input("empty image payload"));
        }
        image::load_from_memory(bytes).map_err(|e| {
            SortiumError::invalid_input(format!("failed to decode image from bytes: {e}"))
        })
    }

    /// Encode an image to lossless PNG bytes
    ///
    /// # Errors
    /// - Image encoding failures from the underlying codec
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}
