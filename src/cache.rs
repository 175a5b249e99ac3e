//! Session cache for transform results.
//!
//! Re-applying an unchanged framing, or selecting the same photo twice,
//! would otherwise decode and re-encode a multi-megapixel image again.
//! [`TransformCache`] remembers encoded outputs for the lifetime of one
//! pipeline. It is constructed once and handed to whoever needs it; there
//! is no global instance.
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: lookups are by the combination of
//! `source_hash` and `params_hash`, never by item id or filename.
//!
//! - **`source_hash`**: SHA-256 of the (normalized) source bytes.
//! - **`params_hash`**: SHA-256 of the sanitized edit spec, output edge cap
//!   and quality. Any change re-runs the transform.
//!
//! Entries are never evicted. A session handles at most a listing's worth
//! of images, so the cache grows with the number of distinct framings.

use crate::imaging::TransformParams;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// SHA-256 of in-memory bytes, as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of everything that influences a transform's output.
pub fn hash_transform_params(params: &TransformParams) -> String {
    let spec = params.spec.sanitized();
    let mut hasher = Sha256::new();
    hasher.update(b"transform\0");
    hasher.update(spec.rotation.degrees().to_le_bytes());
    hasher.update(spec.zoom.to_le_bytes());
    hasher.update(spec.pan_x.to_le_bytes());
    hasher.update(spec.pan_y.to_le_bytes());
    hasher.update(params.max_edge_px.to_le_bytes());
    hasher.update([params.quality.value()]);
    format!("{:x}", hasher.finalize())
}

fn cache_key(source_hash: &str, params_hash: &str) -> String {
    format!("{}:{}", source_hash, params_hash)
}

/// Content-addressed store of encoded transform outputs.
#[derive(Debug, Default)]
pub struct TransformCache {
    enabled: bool,
    entries: Mutex<HashMap<String, Bytes>>,
    stats: Mutex<CacheStats>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// A cache that never hits; every lookup counts as a miss.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Look up the output for `(source_hash, params)`.
    pub fn get(&self, source_hash: &str, params: &TransformParams) -> Option<Bytes> {
        let found = if self.enabled {
            let key = cache_key(source_hash, &hash_transform_params(params));
            self.entries.lock().ok()?.get(&key).cloned()
        } else {
            None
        };
        if let Ok(mut stats) = self.stats.lock() {
            match found {
                Some(_) => stats.hit(),
                None => stats.miss(),
            }
        }
        found
    }

    pub fn insert(&self, source_hash: &str, params: &TransformParams, output: Bytes) {
        if !self.enabled {
            return;
        }
        let key = cache_key(source_hash, &hash_transform_params(params));
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, output);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }
}

/// Summary of cache performance for a session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} transformed ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} transformed", self.misses)
        }
    }
}
