//! Intake configuration module.
//!
//! Handles loading, validating, and merging `intake.toml`. The embedding
//! page (or the CLI) supplies these values; every key is optional and
//! falls back to the stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! bucket = "listing-images"  # Storage bucket for processed images
//! user_id = "local"          # Owner id; first segment of every object key
//! max_items = 10             # Maximum images per listing
//! max_file_mb = 15           # Larger selections are rejected
//! max_edge_px = 1600         # Longer output edge cap (never upscales)
//! jpeg_quality = 0.85        # Final JPEG quality, 0-1
//! initial_items = []         # Previously stored [{ url = "...", key = "..." }]
//!
//! [upload]
//! max_retries = 3            # Attempts before giving up
//! timeout_ms = 30000         # Bound on each storage call
//! backoff_step_ms = 800      # Wait after attempt n is n x this
//! progress_interval_ms = 600 # Synthetic progress tick interval
//! progress_step = 6          # Percent added per tick (capped below 90)
//! cache_control = "3600"     # Cache-Control max-age for stored objects
//!
//! [processing]
//! workers = 1                # Transform worker threads (FIFO)
//!
//! [preview]
//! width = 480                # Live preview surface size
//! height = 360
//!
//! [storage]
//! endpoint = ""              # Hosted storage REST endpoint (CLI only)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! max_items = 6
//!
//! [upload]
//! timeout_ms = 10000
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Quality;
use crate::types::RemoteRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Intake configuration loaded from `intake.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeConfig {
    pub bucket: String,
    pub user_id: String,
    /// Upper bound on the item list; selection never evicts to make room.
    pub max_items: usize,
    pub max_file_mb: u64,
    pub max_edge_px: u32,
    pub jpeg_quality: f32,
    /// Stored images the listing already has.
    pub initial_items: Vec<RemoteRecord>,
    pub upload: UploadConfig,
    pub processing: ProcessingConfig,
    pub preview: PreviewConfig,
    pub storage: StorageConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            bucket: "listing-images".to_string(),
            user_id: "local".to_string(),
            max_items: 10,
            max_file_mb: 15,
            max_edge_px: 1600,
            jpeg_quality: 0.85,
            initial_items: Vec::new(),
            upload: UploadConfig::default(),
            processing: ProcessingConfig::default(),
            preview: PreviewConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl IntakeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Validation("bucket must not be empty".into()));
        }
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::Validation("user_id must not be empty".into()));
        }
        if self.max_items == 0 {
            return Err(ConfigError::Validation("max_items must be at least 1".into()));
        }
        if self.max_edge_px == 0 {
            return Err(ConfigError::Validation(
                "max_edge_px must be at least 1".into(),
            ));
        }
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
            return Err(ConfigError::Validation(
                "jpeg_quality must be in (0, 1]".into(),
            ));
        }
        if self.upload.max_retries == 0 {
            return Err(ConfigError::Validation(
                "upload.max_retries must be at least 1".into(),
            ));
        }
        if self.processing.workers == 0 {
            return Err(ConfigError::Validation(
                "processing.workers must be at least 1".into(),
            ));
        }
        if self.preview.width == 0 || self.preview.height == 0 {
            return Err(ConfigError::Validation(
                "preview width and height must be non-zero".into(),
            ));
        }
        if self.initial_items.len() > self.max_items {
            return Err(ConfigError::Validation(format!(
                "{} initial_items exceed max_items = {}",
                self.initial_items.len(),
                self.max_items
            )));
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::from_fraction(self.jpeg_quality)
    }

    /// `max_file_mb` in bytes.
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_mb.saturating_mul(1024 * 1024)
    }
}

/// Upload retry, timeout and progress settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub backoff_step_ms: u64,
    pub progress_interval_ms: u64,
    pub progress_step: u8,
    pub cache_control: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_ms: 30_000,
            backoff_step_ms: 800,
            progress_interval_ms: 600,
            progress_step: 6,
            cache_control: "3600".to_string(),
        }
    }
}

/// Transform worker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Worker threads. With one worker, transforms also complete in
    /// submission order.
    pub workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

/// Live preview surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 360,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Base URL of the hosted storage service. Empty means local storage.
    pub endpoint: String,
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(IntakeConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<IntakeConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: IntakeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, merged over stock defaults and validated.
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<IntakeConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Returns a fully-commented stock `intake.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# disc-intake configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Storage bucket for processed listing images.
bucket = "listing-images"

# Owner id. Every object key starts with it.
user_id = "local"

# Maximum number of images per listing. Selections beyond the remaining
# room are ignored; nothing is ever evicted.
max_items = 10

# Files larger than this (in MiB) are rejected at selection.
max_file_mb = 15

# Longer edge of the uploaded image, in pixels. Smaller crops are not
# upscaled.
max_edge_px = 1600

# JPEG quality of the uploaded image, 0-1.
jpeg_quality = 0.85

# Images already stored for this listing. They start out done and are not
# editable until their bytes are restored.
# initial_items = [
#   { url = "https://.../u/2026/03/04/1-abc123.jpg", key = "u/2026/03/04/1-abc123.jpg" },
# ]
initial_items = []

# ---------------------------------------------------------------------------
# Upload
# ---------------------------------------------------------------------------
[upload]
# Attempts per image. Each attempt tries the direct upload, then a signed
# upload ticket.
max_retries = 3

# Timeout for every storage call, in milliseconds.
timeout_ms = 30000

# Linear backoff: after attempt n, wait n x backoff_step_ms.
backoff_step_ms = 800

# Synthetic progress while a request is in flight.
progress_interval_ms = 600
progress_step = 6

# Cache-Control max-age (seconds) attached to stored objects.
cache_control = "3600"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Transform worker threads. Jobs start in submission order.
workers = 1

# ---------------------------------------------------------------------------
# Live preview
# ---------------------------------------------------------------------------
[preview]
width = 480
height = 360

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Base URL of the hosted storage REST API. Leave empty to write objects to
# a local directory instead.
endpoint = ""
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = IntakeConfig::default();
        assert_eq!(config.bucket, "listing-images");
        assert_eq!(config.max_items, 10);
        assert_eq!(config.max_edge_px, 1600);
        assert_eq!(config.quality().value(), 85);
        assert_eq!(config.upload.max_retries, 3);
        assert_eq!(config.upload.timeout_ms, 30_000);
        assert_eq!(config.processing.workers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
max_items = 4

[upload]
timeout_ms = 5000
"#;
        let config: IntakeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_items, 4);
        assert_eq!(config.upload.timeout_ms, 5000);
        // Defaults preserved
        assert_eq!(config.upload.backoff_step_ms, 800);
        assert_eq!(config.bucket, "listing-images");
    }

    #[test]
    fn parse_initial_items() {
        let toml = r#"
initial_items = [
  { url = "https://cdn.test/a.jpg", key = "u/2026/01/02/1-aaaaaa.jpg" },
]
"#;
        let config: IntakeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.initial_items.len(), 1);
        assert_eq!(config.initial_items[0].key, "u/2026/01/02/1-aaaaaa.jpg");
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<IntakeConfig, _> = toml::from_str("max_itmes = 3");
        assert!(result.is_err());

        let result: Result<IntakeConfig, _> = toml::from_str("[upload]\nretries = 3");
        assert!(result.is_err());
    }

    #[test]
    fn max_file_bytes_is_mebibytes() {
        let config = IntakeConfig {
            max_file_mb: 2,
            ..IntakeConfig::default()
        };
        assert_eq!(config.max_file_bytes(), 2 * 1024 * 1024);
    }

    // =========================================================================
    // validate tests
    // =========================================================================

    fn invalid(config: IntakeConfig) -> String {
        match config.validate() {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_items() {
        let msg = invalid(IntakeConfig {
            max_items: 0,
            ..IntakeConfig::default()
        });
        assert!(msg.contains("max_items"));
    }

    #[test]
    fn validate_rejects_quality_out_of_range() {
        for q in [0.0, -0.5, 1.5, f32::NAN] {
            let msg = invalid(IntakeConfig {
                jpeg_quality: q,
                ..IntakeConfig::default()
            });
            assert!(msg.contains("jpeg_quality"));
        }
    }

    #[test]
    fn validate_rejects_zero_retries_and_workers() {
        let mut config = IntakeConfig::default();
        config.upload.max_retries = 0;
        assert!(invalid(config).contains("max_retries"));

        let mut config = IntakeConfig::default();
        config.processing.workers = 0;
        assert!(invalid(config).contains("workers"));
    }

    #[test]
    fn validate_rejects_blank_owner() {
        let msg = invalid(IntakeConfig {
            user_id: "  ".into(),
            ..IntakeConfig::default()
        });
        assert!(msg.contains("user_id"));
    }

    #[test]
    fn validate_rejects_too_many_initial_items() {
        let record = RemoteRecord {
            url: "u".into(),
            key: "k".into(),
        };
        let msg = invalid(IntakeConfig {
            max_items: 1,
            initial_items: vec![record.clone(), record],
            ..IntakeConfig::default()
        });
        assert!(msg.contains("initial_items"));
    }

    // =========================================================================
    // merge / load tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[upload]
max_retries = 3
timeout_ms = 30000
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[upload]\ntimeout_ms = 100").unwrap();
        let merged = merge_toml(base, overlay);
        let upload = merged.get("upload").unwrap();
        assert_eq!(upload.get("timeout_ms").unwrap().as_integer(), Some(100));
        assert_eq!(upload.get("max_retries").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("a = [1, 2]\nb = 1").unwrap();
        let overlay: toml::Value = toml::from_str("a = [3]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_array().unwrap().len(), 1);
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(1));
    }

    #[test]
    fn load_config_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("intake.toml")).unwrap();
        assert_eq!(config, IntakeConfig::default());
    }

    #[test]
    fn load_config_merges_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("intake.toml");
        fs::write(&path, "user_id = \"seller-9\"\n[preview]\nwidth = 640\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.user_id, "seller-9");
        assert_eq!(config.preview.width, 640);
        assert_eq!(config.preview.height, 360);
    }

    #[test]
    fn load_config_invalid_values_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("intake.toml");
        fs::write(&path, "max_items = 0").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_bad_toml_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("intake.toml");
        fs::write(&path, "max_items = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: IntakeConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, IntakeConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for section in ["upload", "processing", "preview", "storage"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }
}
