//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::ImageReader` with format sniffing |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Crop / rotate / cover | [`render_plan`](super::operations::render_plan) |
//! | Resize | `image::imageops` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, ImageBackend};
use super::operations::transform_decoded;
use super::params::{Quality, TransformParams};
use crate::normalize::{ConvertError, FormatConverter, TargetFormat};
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn open_decoder(source: &[u8]) -> Result<impl ImageDecoder + '_, BackendError> {
    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .into_decoder()
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode image: {}", e)))
}

/// Decode an in-memory image and apply its EXIF orientation.
pub fn decode_image(source: &[u8]) -> Result<DynamicImage, BackendError> {
    let mut decoder = open_decoder(source)?;
    // A missing or unreadable orientation tag means "as stored"
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode image: {}", e)))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Encode to baseline JPEG. Alpha is dropped.
pub fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.value())
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn transform(&self, source: &[u8], params: &TransformParams) -> Result<Vec<u8>, BackendError> {
        let img = decode_image(source)?;
        let output = transform_decoded(&img, params);
        encode_jpeg(&output, params.quality)
    }
}

impl FormatConverter for RustBackend {
    /// Re-encode through the `image` decoders. Fails for containers with no
    /// compiled-in decoder (HEIC/HEIF), which the normalizer tolerates.
    fn convert(
        &self,
        source: &[u8],
        target: TargetFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, ConvertError> {
        let img = decode_image(source).map_err(|e| ConvertError::Failed(e.to_string()))?;
        match target {
            TargetFormat::Jpeg => {
                encode_jpeg(&img, quality).map_err(|e| ConvertError::Failed(e.to_string()))
            }
        }
    }
}
