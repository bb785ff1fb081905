//! Gallery Vault - Transcoder
//!
//! Decode, downsample and re-encode images as JPEG.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageReader};

use crate::error::{VaultError, VaultResult};

/// Output parameters for imported pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeSettings {
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            max_width: 1920,
            jpeg_quality: 75,
        }
    }
}

/// Read a source image and produce the JPEG bytes to store.
///
/// The decoder is chosen from the file content, so mislabeled files still import.
pub fn transcode_file(source: &Path, settings: TranscodeSettings) -> VaultResult<Vec<u8>> {
    let img = ImageReader::open(source)?.with_guessed_format()?.decode()?;
    let img = limit_width(img, settings.max_width);
    encode_jpeg(&img, settings.jpeg_quality)
}

/// Downsample to `max_width` when wider; narrower images are untouched
pub fn limit_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    if img.width() > max_width {
        resize_to_width(&img, max_width)
    } else {
        img
    }
}

/// Resize to exactly `width`, keeping the aspect ratio
pub fn resize_to_width(img: &DynamicImage, width: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let width = width.max(1);
    let height = ((h as f64 * width as f64 / w.max(1) as f64).round() as u32).max(1);

    img.resize_exact(width, height, FilterType::Lanczos3)
}

/// Encode as baseline JPEG
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> VaultResult<Vec<u8>> {
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut output), quality.clamp(1, 100));

    encoder
        .encode_image(&img.to_rgb8())
        .map_err(|e| VaultError::ImageError(e.to_string()))?;
    drop(encoder);

    Ok(output)
}
