//! The object storage boundary.
//!
//! The pipeline only ever talks to storage through [`ObjectStore`]. The
//! hosted service, a local directory and the test doubles all implement
//! the same four calls.

use super::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A one-time credential for a direct upload to `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUploadTicket {
    pub token: String,
    pub path: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Primary transport: write `body` under `key`.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), StorageError>;

    /// Publicly fetchable URL for `key`. Pure string construction.
    fn public_url(&self, key: &str) -> String;

    /// Ask the service for a single-use upload ticket for `key`.
    async fn create_signed_upload_ticket(&self, key: &str)
    -> Result<SignedUploadTicket, StorageError>;

    /// Fallback transport: write `body` using a ticket.
    async fn put_via_ticket(
        &self,
        ticket: &SignedUploadTicket,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
