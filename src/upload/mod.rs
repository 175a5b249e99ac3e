//! Durable upload of processed images to remote object storage.
//!
//! | Piece | Role |
//! |---|---|
//! | [`keys`] | owner-scoped, time-partitioned object keys |
//! | [`policy`] | [`RetryPolicy`] state machine and the synthetic [`ProgressTicker`] |
//! | [`storage`] | the [`ObjectStore`] boundary the hosting backend implements |
//! | [`coordinator`] | [`UploadCoordinator`]: primary → fallback → backoff → retry |
//! | [`http`] | REST client for the hosted storage service |
//! | [`local`] | filesystem-backed store for local runs |
//!
//! Each [`UploadCoordinator::upload`] call ends in exactly one of a stored
//! `{url, key}` or [`UploadError::Exhausted`].

pub mod coordinator;
pub mod http;
pub mod keys;
pub mod local;
pub mod policy;
pub mod storage;

pub use coordinator::{UploadCoordinator, UploadHint, UploadOptions};
pub use http::HttpObjectStore;
pub use keys::KeyBase;
pub use local::LocalObjectStore;
pub use policy::{ProgressTicker, RetryPolicy, RetryState, Step, Transport};
pub use storage::{ObjectStore, SignedUploadTicket};

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("storage returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid upload ticket: {0}")]
    InvalidTicket(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Transport(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("upload failed after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<UploadError>,
    },
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
