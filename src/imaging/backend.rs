//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the operation the pipeline needs from
//! a pixel engine: transform. It works on in-memory byte buffers; nothing
//! here touches the filesystem.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests swap in [`tests::MockBackend`] to record what the pipeline
//! asked for without decoding anything.

use super::params::TransformParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// Implementations must be shareable across the worker pool, so the trait
/// requires `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Decode, crop, rotate, resize and re-encode `source`.
    ///
    /// Pure: identical inputs give identical bytes.
    fn transform(&self, source: &[u8], params: &TransformParams) -> Result<Vec<u8>, BackendError>;
}
