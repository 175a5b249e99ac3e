//! Shared types passed between the pipeline stages and the embedding page.
//!
//! [`UploadItem`] is the snapshot handed to observers after every mutation.
//! It deliberately carries no image bytes: the local source is owned by the
//! tracker entry and dropped with it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Opaque, session-unique item identifier. Allocation order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img-{}", self.0)
    }
}

/// Lifecycle state of one image.
///
/// ```text
/// queued → processing → uploading → done
///              │             │        │
///              └──→ error ←──┘        └──→ processing (re-edit)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Queued,
    Processing,
    Uploading,
    Done,
    Error,
}

impl ItemStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Staying in the same state is always allowed (progress updates).
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        self == next
            || matches!(
                (self, next),
                (Queued, Processing)
                    | (Processing, Uploading)
                    | (Processing, Error)
                    | (Uploading, Done)
                    | (Uploading, Error)
                    | (Done, Processing)
                    | (Error, Processing)
            )
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Processing => "processing",
            ItemStatus::Uploading => "uploading",
            ItemStatus::Done => "done",
            ItemStatus::Error => "error",
        }
    }
}

/// One user-selected or previously stored image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
    pub id: ItemId,
    /// Display filename.
    pub name: String,
    /// Original byte size; 0 for items synthesized from remote records.
    pub size_bytes: u64,
    pub status: ItemStatus,
    /// 0–100, never decreases within one processing/upload attempt.
    pub progress_percent: u8,
    /// Publicly fetchable URL, set once the item is `done`. A re-edit keeps
    /// the previous URL until its replacement is stored.
    pub remote_url: Option<String>,
    /// Storage object key matching `remote_url`.
    pub storage_key: Option<String>,
    /// True while the original bytes are held locally for re-editing.
    pub editable: bool,
    /// Failure reason, set only in the `error` state.
    pub error: Option<String>,
}

impl UploadItem {
    /// A freshly selected local file, not yet admitted to processing.
    pub fn local(id: ItemId, name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            id,
            name: name.into(),
            size_bytes,
            status: ItemStatus::Queued,
            progress_percent: 0,
            remote_url: None,
            storage_key: None,
            editable: true,
            error: None,
        }
    }

    /// An item restored from a persisted `{url, key}` record.
    pub fn remote(id: ItemId, record: &RemoteRecord) -> Self {
        Self {
            id,
            name: record.display_name(),
            size_bytes: 0,
            status: ItemStatus::Done,
            progress_percent: 100,
            remote_url: Some(record.url.clone()),
            storage_key: Some(record.key.clone()),
            editable: false,
            error: None,
        }
    }

    /// The `{url, key}` pair the embedding page persists, once known.
    pub fn stored(&self) -> Option<StoredObject> {
        match (&self.remote_url, &self.storage_key) {
            (Some(url), Some(key)) => Some(StoredObject {
                url: url.clone(),
                key: key.clone(),
            }),
            _ => None,
        }
    }
}

/// Result of a successful upload: public URL plus the backend object key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
}

/// A previously persisted listing image, as stored in the listing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteRecord {
    pub url: String,
    pub key: String,
}

impl RemoteRecord {
    /// Last path segment of the key, used as the display name.
    pub fn display_name(&self) -> String {
        self.key
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.key)
            .to_string()
    }
}

/// A file handed over by a camera or gallery picker.
///
/// `bytes` is fully materialized in memory; the pipeline never streams a
/// lazily produced handle to the transport.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    /// Declared MIME type, if the picker reported one.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.map(str::to_string),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, sniffing its content type.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = crate::naming::display_name(path);
        let content_type = crate::naming::content_type_for(&bytes, &name);
        Ok(Self::new(name, content_type, bytes))
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}
