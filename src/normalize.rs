//! Format normalization for camera-native images.
//!
//! Phones hand over HEIC/HEIF stills that most decoders cannot read. Before
//! a file reaches the Transform Engine, [`FormatNormalizer`] converts such
//! files to JPEG through a [`FormatConverter`]. Conversion is best-effort:
//! when it fails the original file continues down the pipeline untouched
//! and the failure is only logged.

use crate::imaging::Quality;
use crate::naming::{is_legacy_camera_format, looks_like_heif, with_extension};
use crate::types::SelectedFile;
use bytes::Bytes;
use log::{debug, warn};
use std::sync::Arc;
use thiserror::Error;

/// Fixed quality for legacy-format conversion (before any user framing).
pub const LEGACY_CONVERSION_QUALITY: f32 = 0.9;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Unsupported source format: {0}")]
    Unsupported(String),
    #[error("Conversion failed: {0}")]
    Failed(String),
}

/// Formats the normalizer can convert into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
        }
    }
}

/// A format conversion library: `convert(blob, targetType, quality) → blob`.
pub trait FormatConverter: Send + Sync {
    fn convert(
        &self,
        source: &[u8],
        target: TargetFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, ConvertError>;
}

/// Converts legacy camera formats; passes everything else through.
#[derive(Clone)]
pub struct FormatNormalizer {
    converter: Arc<dyn FormatConverter>,
    target: TargetFormat,
    quality: Quality,
}

impl FormatNormalizer {
    pub fn new(converter: Arc<dyn FormatConverter>) -> Self {
        Self {
            converter,
            target: TargetFormat::Jpeg,
            quality: Quality::from_fraction(LEGACY_CONVERSION_QUALITY),
        }
    }

    /// Whether `file` is in a format that should be converted first.
    pub fn needs_conversion(file: &SelectedFile) -> bool {
        is_legacy_camera_format(file.content_type.as_deref(), &file.name)
            || looks_like_heif(&file.bytes)
    }

    /// Convert `file` if it is a legacy format. Never fails: on conversion
    /// error the original file is returned unchanged.
    pub async fn normalize(&self, file: SelectedFile) -> SelectedFile {
        if !Self::needs_conversion(&file) {
            return file;
        }

        let converter = Arc::clone(&self.converter);
        let source = file.bytes.clone();
        let (target, quality) = (self.target, self.quality);
        let result =
            tokio::task::spawn_blocking(move || converter.convert(&source, target, quality))
                .await
                .unwrap_or_else(|e| {
                    Err(ConvertError::Failed(format!("conversion task aborted: {}", e)))
                });

        match result {
            Ok(converted) => {
                debug!(
                    "converted {} ({} bytes) to {} ({} bytes)",
                    file.name,
                    file.bytes.len(),
                    target.mime_type(),
                    converted.len()
                );
                SelectedFile {
                    name: with_extension(&file.name, target.extension()),
                    content_type: Some(target.mime_type().to_string()),
                    bytes: Bytes::from(converted),
                }
            }
            Err(e) => {
                warn!("{}: {}; continuing with original bytes", file.name, e);
                file
            }
        }
    }
}
