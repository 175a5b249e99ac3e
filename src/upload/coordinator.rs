//! Durable Upload Coordinator.
//!
//! Drives one payload through a [`RetryState`]: primary put, fallback via a
//! signed ticket, linear backoff, repeat. Every storage call is raced
//! against the policy timeout; expiry counts as a transport failure. While
//! the attempts run, a [`ProgressTicker`] emits synthetic progress on a
//! fixed interval.

use super::keys::KeyBase;
use super::policy::{ProgressTicker, RetryPolicy, RetryState, Step, Transport};
use super::storage::ObjectStore;
use super::{StorageError, UploadError};
use crate::config::IntakeConfig;
use crate::types::StoredObject;
use bytes::Bytes;
use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// What is being uploaded: decides the key extension and content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHint {
    pub extension: String,
    pub content_type: String,
}

impl UploadHint {
    pub fn jpeg() -> Self {
        Self {
            extension: "jpg".to_string(),
            content_type: "image/jpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Owning user; first key segment.
    pub owner_id: String,
    /// `Cache-Control` max-age in seconds, as the store expects it.
    pub cache_control: String,
    pub policy: RetryPolicy,
    pub progress_interval: Duration,
    pub progress_step: u8,
}

impl UploadOptions {
    pub fn from_config(config: &IntakeConfig) -> Self {
        let upload = &config.upload;
        Self {
            owner_id: config.user_id.clone(),
            cache_control: upload.cache_control.clone(),
            policy: RetryPolicy {
                max_attempts: upload.max_retries,
                backoff_step: Duration::from_millis(upload.backoff_step_ms),
                timeout: Duration::from_millis(upload.timeout_ms),
            },
            progress_interval: Duration::from_millis(upload.progress_interval_ms.max(1)),
            progress_step: upload.progress_step,
        }
    }
}

pub struct UploadCoordinator {
    store: Arc<dyn ObjectStore>,
    options: UploadOptions,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, options: UploadOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Upload `payload`, reporting progress from `start_percent` upward.
    ///
    /// Resolves with the stored `{url, key}` or fails with
    /// [`UploadError::Exhausted`]. `on_progress` sees strictly increasing
    /// values below 90, then 100 once the store confirms the write.
    pub async fn upload<F>(
        &self,
        payload: Bytes,
        hint: &UploadHint,
        start_percent: u8,
        mut on_progress: F,
    ) -> Result<StoredObject, UploadError>
    where
        F: FnMut(u8) + Send,
    {
        let mut ticker = ProgressTicker::new(start_percent, self.options.progress_step);
        let mut interval = tokio::time::interval(self.options.progress_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        let attempts = self.run_attempts(&payload, hint);
        tokio::pin!(attempts);

        loop {
            tokio::select! {
                result = &mut attempts => {
                    if result.is_ok() {
                        on_progress(100);
                    }
                    return result;
                }
                _ = interval.tick() => {
                    if let Some(percent) = ticker.tick() {
                        on_progress(percent);
                    }
                }
            }
        }
    }

    async fn run_attempts(
        &self,
        payload: &Bytes,
        hint: &UploadHint,
    ) -> Result<StoredObject, UploadError> {
        let base = KeyBase::now(&self.options.owner_id);
        let mut state: RetryState = self.options.policy.start();
        let mut step = state.current();
        let mut last_error = None;

        loop {
            match step {
                Step::Attempt { attempt, transport } => {
                    let signed = transport == Transport::Fallback;
                    let key = base.key(attempt, signed, &hint.extension);
                    debug!("upload attempt {} via {:?}: {}", attempt, transport, key);

                    let result = match transport {
                        Transport::Primary => self.put_primary(&key, payload, hint).await,
                        Transport::Fallback => self.put_fallback(&key, payload, hint).await,
                    };
                    match result {
                        Ok(stored) => {
                            info!("uploaded {} ({} bytes)", stored.key, payload.len());
                            return Ok(stored);
                        }
                        Err(e) => {
                            warn!("upload attempt {} via {:?} failed: {}", attempt, transport, e);
                            last_error = Some(e);
                            step = state.failed();
                        }
                    }
                }
                Step::Wait {
                    delay,
                    next_attempt,
                } => {
                    debug!("backing off {:?} before attempt {}", delay, next_attempt);
                    tokio::time::sleep(delay).await;
                    step = state.current();
                }
                Step::GiveUp { attempts } => {
                    let last = last_error.unwrap_or_else(|| {
                        UploadError::Storage(StorageError::Transport(
                            "no attempt was made".to_string(),
                        ))
                    });
                    error!("upload gave up after {} attempt(s): {}", attempts, last);
                    return Err(UploadError::Exhausted {
                        attempts,
                        last: Box::new(last),
                    });
                }
            }
        }
    }

    async fn put_primary(
        &self,
        key: &str,
        payload: &Bytes,
        hint: &UploadHint,
    ) -> Result<StoredObject, UploadError> {
        self.bounded(self.store.put_object(
            key,
            payload.clone(),
            &hint.content_type,
            &self.options.cache_control,
        ))
        .await?;
        Ok(StoredObject {
            url: self.store.public_url(key),
            key: key.to_string(),
        })
    }

    async fn put_fallback(
        &self,
        key: &str,
        payload: &Bytes,
        hint: &UploadHint,
    ) -> Result<StoredObject, UploadError> {
        let ticket = self
            .bounded(self.store.create_signed_upload_ticket(key))
            .await?;
        self.bounded(
            self.store
                .put_via_ticket(&ticket, payload.clone(), &hint.content_type),
        )
        .await?;
        Ok(StoredObject {
            url: self.store.public_url(&ticket.path),
            key: ticket.path,
        })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, UploadError> {
        let limit = self.options.policy.timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(UploadError::Timeout(limit)),
        }
    }
}
