//! Filesystem-backed object store for local runs.
//!
//! Objects are written under a root directory and their public URL is a
//! `file://` URL. Signed tickets are random single-use tokens held in
//! memory; a ticket is consumed by its first write.

use super::StorageError;
use super::storage::{ObjectStore, SignedUploadTicket};
use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct LocalObjectStore {
    root: PathBuf,
    tickets: Mutex<HashMap<String, String>>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tickets: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of `key`. Keys never escape the root.
    pub fn object_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    async fn write(&self, key: &str, body: &[u8]) -> Result<(), StorageError> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        _content_type: &str,
        _cache_control: &str,
    ) -> Result<(), StorageError> {
        self.write(key, &body).await
    }

    fn public_url(&self, key: &str) -> String {
        format!("file://{}", self.object_path(key).display())
    }

    async fn create_signed_upload_ticket(
        &self,
        key: &str,
    ) -> Result<SignedUploadTicket, StorageError> {
        let token: String = {
            let mut rng = rand::rng();
            (0..32)
                .map(|_| char::from_digit(rng.random_range(0..16), 16).unwrap_or('0'))
                .collect()
        };
        self.tickets
            .lock()
            .map_err(|_| StorageError::Transport("ticket table poisoned".to_string()))?
            .insert(token.clone(), key.to_string());
        Ok(SignedUploadTicket {
            token,
            path: key.to_string(),
        })
    }

    async fn put_via_ticket(
        &self,
        ticket: &SignedUploadTicket,
        body: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let issued_for = self
            .tickets
            .lock()
            .map_err(|_| StorageError::Transport("ticket table poisoned".to_string()))?
            .remove(&ticket.token);
        match issued_for {
            Some(path) if path == ticket.path => self.write(&path, &body).await,
            Some(_) => Err(StorageError::InvalidTicket(format!(
                "ticket was not issued for {}",
                ticket.path
            ))),
            None => Err(StorageError::InvalidTicket("unknown or used token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_object_writes_under_root() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        store
            .put_object(
                "u1/2026/03/04/1-abc.jpg",
                Bytes::from_static(b"jpeg"),
                "image/jpeg",
                "3600",
            )
            .await
            .unwrap();

        let path = tmp.path().join("u1/2026/03/04/1-abc.jpg");
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
        assert_eq!(
            store.public_url("u1/2026/03/04/1-abc.jpg"),
            format!("file://{}", path.display())
        );
    }

    #[tokio::test]
    async fn ticket_is_single_use() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        let ticket = store.create_signed_upload_ticket("u1/k-signed.jpg").await.unwrap();
        assert_eq!(ticket.token.len(), 32);
        store
            .put_via_ticket(&ticket, Bytes::from_static(b"a"), "image/jpeg")
            .await
            .unwrap();
        assert!(tmp.path().join("u1/k-signed.jpg").exists());

        let again = store
            .put_via_ticket(&ticket, Bytes::from_static(b"b"), "image/jpeg")
            .await;
        assert!(matches!(again, Err(StorageError::InvalidTicket(_))));
    }

    #[tokio::test]
    async fn ticket_bound_to_its_path() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        let mut ticket = store.create_signed_upload_ticket("u1/a.jpg").await.unwrap();
        ticket.path = "u1/b.jpg".to_string();
        let result = store
            .put_via_ticket(&ticket, Bytes::from_static(b"x"), "image/jpeg")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidTicket(_))));
        assert!(!tmp.path().join("u1/b.jpg").exists());
    }

    #[test]
    fn parent_segments_are_dropped() {
        let store = LocalObjectStore::new("/srv/objects");
        assert_eq!(
            store.object_path("../../etc/passwd"),
            PathBuf::from("/srv/objects/etc/passwd")
        );
    }
}
