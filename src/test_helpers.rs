//! Shared test utilities for the disc-intake test suite.
//!
//! Synthetic images are generated in memory so tests never depend on
//! fixture files. [`ScriptedStore`] is an [`ObjectStore`] whose transports
//! fail or succeed on a script, for driving the retry machinery.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = jpeg_bytes(400, 300);
//! let store = ScriptedStore::reliable();
//! let flaky = ScriptedStore::primary_down().fallback_ok_from(2);
//! ```

use crate::upload::{ObjectStore, SignedUploadTicket, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbImage};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

// =========================================================================
// Synthetic images
// =========================================================================

/// A gradient that makes every pixel position distinguishable.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Encode a `width`×`height` gradient as JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Encode a `width`×`height` gradient as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

// =========================================================================
// Scripted object store
// =========================================================================

/// In-memory store with scripted transport outcomes.
///
/// Call numbers are 1-based and counted per transport. The coordinator
/// makes one primary call per attempt, so "primary call n" is "attempt n".
#[derive(Default)]
pub struct ScriptedStore {
    primary_ok_from: Option<u32>,
    fallback_ok_from: Option<u32>,
    hang_primary: bool,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    pub primary_calls: AtomicU32,
    pub fallback_calls: AtomicU32,
    /// Keys successfully written, in order.
    pub stored: Mutex<Vec<String>>,
}

impl ScriptedStore {
    /// Primary transport always succeeds.
    pub fn reliable() -> Self {
        Self {
            primary_ok_from: Some(1),
            ..Self::default()
        }
    }

    /// Both transports always fail.
    pub fn broken() -> Self {
        Self::default()
    }

    /// Primary transport always fails; configure the fallback separately.
    pub fn primary_down() -> Self {
        Self::default()
    }

    pub fn primary_ok_from(mut self, call: u32) -> Self {
        self.primary_ok_from = Some(call);
        self
    }

    pub fn fallback_ok_from(mut self, call: u32) -> Self {
        self.fallback_ok_from = Some(call);
        self
    }

    /// Primary calls never complete; only a timeout gets past them.
    pub fn hanging_primary(mut self) -> Self {
        self.hang_primary = true;
        self
    }

    /// Primary calls take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Primary calls wait for `gate` to be notified before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn stored_keys(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn put_object(
        &self,
        key: &str,
        _body: Bytes,
        _content_type: &str,
        _cache_control: &str,
    ) -> Result<(), StorageError> {
        let call = self.primary_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.hang_primary {
            std::future::pending::<()>().await;
        }
        if self.primary_ok_from.is_some_and(|from| call >= from) {
            self.stored.lock().unwrap().push(key.to_string());
            Ok(())
        } else {
            Err(StorageError::Status {
                status: 503,
                body: format!("primary call {} refused", call),
            })
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://storage.test/public/{}", key)
    }

    async fn create_signed_upload_ticket(
        &self,
        key: &str,
    ) -> Result<SignedUploadTicket, StorageError> {
        let call = self.fallback_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fallback_ok_from.is_some_and(|from| call >= from) {
            Ok(SignedUploadTicket {
                token: format!("tok-{}", call),
                path: key.to_string(),
            })
        } else {
            Err(StorageError::Status {
                status: 400,
                body: format!("fallback call {} refused", call),
            })
        }
    }

    async fn put_via_ticket(
        &self,
        ticket: &SignedUploadTicket,
        _body: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.stored.lock().unwrap().push(ticket.path.clone());
        Ok(())
    }
}
