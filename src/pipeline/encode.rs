//! PNG encoding for capability payloads and persisted assets.
//!
//! PNG everywhere, lossless on purpose: compression artefacts on a rendered
//! page degrade both the classifier's reading of fine map labels and the
//! red-pixel thresholding applied to generated images.

use image::{DynamicImage, RgbImage};
use std::io::Cursor;

/// Encode an RGB buffer as PNG bytes.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode any decoded image as PNG bytes.
pub fn encode_dynamic_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
