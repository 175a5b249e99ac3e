//! Capture adapter and per-item orchestration.
//!
//! [`IntakePipeline`] is the surface the embedding page talks to. It admits
//! selected files into the [`ItemTracker`] and drives each admitted item
//! strictly in sequence:
//!
//! ```text
//! normalize ──→ transform (worker) ──→ upload ──→ done
//!    15%             40%              ticks…100%
//!                     │                  │
//!                     └──────→ error ←───┘
//! ```
//!
//! Items run concurrently with each other and fail independently. Every
//! step re-checks that the item is still listed before touching it, so
//! removing or cancelling an item mid-flight is final.
//!
//! Failures and capacity warnings also go out on the optional
//! [`Announcement`] channel for assistive display.

use crate::cache::{TransformCache, hash_bytes};
use crate::config::{ConfigError, IntakeConfig};
use crate::imaging::{BackendError, EditSpec, ImageBackend, RustBackend, TransformParams};
use crate::naming::{content_type_for, is_video};
use crate::normalize::{FormatConverter, FormatNormalizer};
use crate::preview::{EditSession, PreviewRenderer};
use crate::tracker::{ItemTracker, Observer, SubscriptionId, TrackerError};
use crate::types::{ItemId, ItemStatus, SelectedFile, StoredObject, UploadItem};
use crate::upload::{ObjectStore, UploadCoordinator, UploadError, UploadHint, UploadOptions};
use crate::worker::TransformWorker;
use bytes::Bytes;
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Item progress once normalization is done.
pub const NORMALIZED_PERCENT: u8 = 15;
/// Item progress once the transform is done and the upload starts.
pub const TRANSFORMED_PERCENT: u8 = 40;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("You can add up to {max_items} images")]
    CapacityExceeded { max_items: usize },
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Processing(#[from] BackendError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start transform worker: {0}")]
    WorkerStart(#[from] rayon::ThreadPoolBuildError),
}

/// Why a selected file never became an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    Video,
    NotAnImage,
    TooLarge { limit_mb: u64 },
}

/// Short messages for screen readers and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    Added(usize),
    CapacityReached { max_items: usize, ignored: usize },
    Rejected { name: String, reason: RejectReason },
    Failed { id: ItemId, name: String, reason: String },
    Completed { id: ItemId, name: String },
    Removed(usize),
}

/// Outcome of one item's run.
pub type ItemOutcome = (ItemId, Result<StoredObject, IntakeError>);

pub struct IntakeBuilder {
    config: IntakeConfig,
    store: Arc<dyn ObjectStore>,
    backend: Option<Arc<dyn ImageBackend>>,
    converter: Option<Arc<dyn FormatConverter>>,
    cache: Option<Arc<TransformCache>>,
    announcements: Option<Sender<Announcement>>,
    observers: Vec<Observer>,
}

impl IntakeBuilder {
    /// Pixel backend. Defaults to [`RustBackend`].
    pub fn backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Legacy-format converter. Defaults to [`RustBackend`].
    pub fn converter(mut self, converter: Arc<dyn FormatConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Share a transform cache. Defaults to a fresh one.
    pub fn cache(mut self, cache: Arc<TransformCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn announcements(mut self, tx: Sender<Announcement>) -> Self {
        self.announcements = Some(tx);
        self
    }

    /// Subscribe before the initial items are inserted.
    pub fn observer(mut self, observer: Observer) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Result<IntakePipeline, IntakeError> {
        self.config.validate()?;
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(RustBackend::new()) as Arc<dyn ImageBackend>);
        let converter = self
            .converter
            .unwrap_or_else(|| Arc::new(RustBackend::new()) as Arc<dyn FormatConverter>);

        let tracker = Arc::new(ItemTracker::new(self.config.max_items));
        for observer in self.observers {
            tracker.subscribe(observer);
        }
        tracker.insert_remote(&self.config.initial_items);

        Ok(IntakePipeline {
            worker: TransformWorker::new(backend, self.config.processing.workers)?,
            normalizer: FormatNormalizer::new(converter),
            uploader: UploadCoordinator::new(self.store, UploadOptions::from_config(&self.config)),
            cache: self.cache.unwrap_or_else(|| Arc::new(TransformCache::new())),
            announcements: self.announcements,
            tracker,
            config: self.config,
        })
    }
}

pub struct IntakePipeline {
    config: IntakeConfig,
    tracker: Arc<ItemTracker>,
    normalizer: FormatNormalizer,
    worker: TransformWorker,
    uploader: UploadCoordinator,
    cache: Arc<TransformCache>,
    announcements: Option<Sender<Announcement>>,
}

impl IntakePipeline {
    pub fn builder(config: IntakeConfig, store: Arc<dyn ObjectStore>) -> IntakeBuilder {
        IntakeBuilder {
            config,
            store,
            backend: None,
            converter: None,
            cache: None,
            announcements: None,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<ItemTracker> {
        &self.tracker
    }

    pub fn cache(&self) -> &TransformCache {
        &self.cache
    }

    pub fn snapshot(&self) -> Vec<UploadItem> {
        self.tracker.snapshot()
    }

    pub fn aggregate_percent(&self) -> u8 {
        self.tracker.aggregate_percent()
    }

    pub fn stored_objects(&self) -> Vec<StoredObject> {
        self.tracker.stored_objects()
    }

    pub fn subscribe(&self, observer: Observer) -> SubscriptionId {
        self.tracker.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.tracker.unsubscribe(id)
    }

    fn announce(&self, announcement: Announcement) {
        if let Some(tx) = &self.announcements {
            // Nobody listening is fine
            let _ = tx.send(announcement);
        }
    }

    fn rejection(&self, file: &SelectedFile) -> Option<RejectReason> {
        if file.bytes.is_empty() {
            return Some(RejectReason::Empty);
        }
        let declared = file.content_type.as_deref();
        if is_video(declared, &file.name) {
            return Some(RejectReason::Video);
        }
        if let Some(ct) = declared
            && !ct.is_empty()
            && !ct.starts_with("image/")
            && ct != "application/octet-stream"
        {
            return Some(RejectReason::NotAnImage);
        }
        if file.size_bytes() > self.config.max_file_bytes() {
            return Some(RejectReason::TooLarge {
                limit_mb: self.config.max_file_mb,
            });
        }
        None
    }

    /// Admit as many of `files` as there is room for.
    ///
    /// Empty, video, non-image and oversize files are dropped first. With
    /// no room at all nothing happens and `CapacityExceeded` is returned.
    pub fn select(&self, files: Vec<SelectedFile>) -> Result<Vec<ItemId>, IntakeError> {
        let mut accepted = Vec::with_capacity(files.len());
        for file in files {
            match self.rejection(&file) {
                Some(reason) => {
                    debug!("rejecting {}: {:?}", file.name, reason);
                    self.announce(Announcement::Rejected {
                        name: file.name,
                        reason,
                    });
                }
                None => accepted.push(file),
            }
        }
        if accepted.is_empty() {
            return Ok(Vec::new());
        }

        let offered = accepted.len();
        let admission = self.tracker.admit(accepted);
        let max_items = self.tracker.max_items();
        if admission.room == 0 {
            warn!("selection of {} ignored: {} items is the limit", offered, max_items);
            self.announce(Announcement::CapacityReached {
                max_items,
                ignored: offered,
            });
            return Err(IntakeError::CapacityExceeded { max_items });
        }
        if admission.ignored > 0 {
            warn!("{} file(s) ignored: {} items is the limit", admission.ignored, max_items);
            self.announce(Announcement::CapacityReached {
                max_items,
                ignored: admission.ignored,
            });
        }
        info!("added {} image(s)", admission.admitted.len());
        self.announce(Announcement::Added(admission.admitted.len()));
        Ok(admission.admitted)
    }

    /// Select `files` and run every admitted item to completion.
    pub async fn add_files(
        &self,
        files: Vec<SelectedFile>,
    ) -> Result<Vec<ItemOutcome>, IntakeError> {
        let ids = self.select(files)?;
        Ok(self.process_all(&ids).await)
    }

    pub async fn process_all(&self, ids: &[ItemId]) -> Vec<ItemOutcome> {
        join_all(ids.iter().map(|&id| async move { (id, self.process(id).await) })).await
    }

    /// Run a freshly admitted item with the default framing.
    pub async fn process(&self, id: ItemId) -> Result<StoredObject, IntakeError> {
        let source = self
            .tracker
            .source(id)
            .ok_or(TrackerError::UnknownItem(id))?;
        self.run(id, source, EditSpec::default()).await
    }

    /// Decode an idle item's source and open it in the editor.
    pub async fn open_editor(&self, id: ItemId) -> Result<EditSession, IntakeError> {
        let item = self.tracker.get(id).ok_or(TrackerError::UnknownItem(id))?;
        if !matches!(item.status, ItemStatus::Done | ItemStatus::Error) {
            return Err(TrackerError::Busy(id, item.status.label()).into());
        }
        let source = self.tracker.source(id).ok_or(TrackerError::NotEditable(id))?;
        let file = self.normalizer.normalize(self.as_file(&item.name, source)).await;

        let surface = (self.config.preview.width, self.config.preview.height);
        let renderer =
            tokio::task::spawn_blocking(move || PreviewRenderer::new(&file.bytes, surface))
                .await
                .map_err(|e| {
                    BackendError::ProcessingFailed(format!("preview decode aborted: {}", e))
                })??;
        Ok(EditSession::open(id, renderer))
    }

    /// Re-run an item with a confirmed framing and replace its upload.
    ///
    /// Works for `done` items (re-edit) and `error` items (retry). The
    /// previous url and key stay until the replacement is stored.
    pub async fn apply_edit(
        &self,
        id: ItemId,
        spec: EditSpec,
    ) -> Result<StoredObject, IntakeError> {
        let source = self.tracker.begin_edit(id)?;
        self.run(id, source, spec).await
    }

    /// Remove one item unconditionally. Remote bytes are left alone.
    pub fn remove(&self, id: ItemId) -> bool {
        let removed = self.tracker.remove(id);
        if removed {
            self.announce(Announcement::Removed(1));
        }
        removed
    }

    /// Remove every item that is not `done`.
    pub fn cancel_all(&self) -> Vec<ItemId> {
        let removed = self.tracker.cancel_pending();
        if !removed.is_empty() {
            info!("cancelled {} pending image(s)", removed.len());
            self.announce(Announcement::Removed(removed.len()));
        }
        removed
    }

    /// Re-attach fetched bytes to a stored item so it can be edited.
    pub fn restore_source(&self, id: ItemId, bytes: Bytes) -> Result<(), IntakeError> {
        Ok(self.tracker.restore_source(id, bytes)?)
    }

    fn as_file(&self, name: &str, bytes: Bytes) -> SelectedFile {
        let content_type = content_type_for(&bytes, name);
        SelectedFile::new(name, content_type, bytes)
    }

    /// Fail unless `id` is still listed.
    fn still_listed(&self, id: ItemId) -> Result<(), IntakeError> {
        if self.tracker.contains(id) {
            Ok(())
        } else {
            debug!("{} was removed; stopping", id);
            Err(TrackerError::UnknownItem(id).into())
        }
    }

    fn record_failure(&self, id: ItemId, name: &str, reason: String) {
        error!("{} ({}): {}", id, name, reason);
        if self.tracker.fail(id, reason.clone()) {
            self.announce(Announcement::Failed {
                id,
                name: name.to_string(),
                reason,
            });
        }
    }

    /// normalize → transform → upload for one item in `processing`.
    async fn run(
        &self,
        id: ItemId,
        source: Bytes,
        spec: EditSpec,
    ) -> Result<StoredObject, IntakeError> {
        let name = self
            .tracker
            .get(id)
            .map(|item| item.name)
            .ok_or(TrackerError::UnknownItem(id))?;

        let file = self.normalizer.normalize(self.as_file(&name, source)).await;
        self.still_listed(id)?;
        self.tracker.set_progress(id, NORMALIZED_PERCENT);

        let params = TransformParams {
            spec,
            max_edge_px: self.config.max_edge_px,
            quality: self.config.quality(),
        };
        let processed = match self.transform_cached(file.bytes, params).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_failure(id, &name, e.to_string());
                return Err(e.into());
            }
        };

        self.still_listed(id)?;
        if !self
            .tracker
            .transition(id, ItemStatus::Uploading, TRANSFORMED_PERCENT)
        {
            return Err(TrackerError::UnknownItem(id).into());
        }

        let tracker = &self.tracker;
        let result = self
            .uploader
            .upload(processed, &UploadHint::jpeg(), TRANSFORMED_PERCENT, |percent| {
                tracker.set_progress(id, percent);
            })
            .await;

        match result {
            Ok(stored) => {
                if !self.tracker.complete(id, stored.clone()) {
                    debug!("{} removed while uploading; {} is orphaned", id, stored.key);
                    return Err(TrackerError::UnknownItem(id).into());
                }
                self.announce(Announcement::Completed { id, name });
                Ok(stored)
            }
            Err(e) => {
                self.record_failure(id, &name, e.to_string());
                Err(e.into())
            }
        }
    }

    /// Transform on the worker, consulting the session cache first.
    ///
    /// The result is a fully materialized buffer ready for the transport.
    async fn transform_cached(
        &self,
        source: Bytes,
        params: TransformParams,
    ) -> Result<Bytes, BackendError> {
        let source_hash = hash_bytes(&source);
        if let Some(hit) = self.cache.get(&source_hash, &params) {
            debug!("transform cache hit for {}", &source_hash[..12]);
            return Ok(hit);
        }
        let output = Bytes::from(self.worker.transform(source, params).await?);
        self.cache.insert(&source_hash, &params, output.clone());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{Rotation, backend::tests::RecordedOp};
    use crate::test_helpers::{ScriptedStore, jpeg_bytes};
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use std::sync::mpsc;
    use tokio::sync::Notify;

    fn jpeg(name: &str) -> SelectedFile {
        SelectedFile::new(name, Some("image/jpeg"), name.as_bytes().to_vec())
    }

    struct Harness {
        pipeline: IntakePipeline,
        backend: Arc<MockBackend>,
        store: Arc<ScriptedStore>,
        events: mpsc::Receiver<Announcement>,
    }

    impl Harness {
        fn events(&self) -> Vec<Announcement> {
            self.events.try_iter().collect()
        }
    }

    fn harness_with(config: IntakeConfig, backend: MockBackend, store: ScriptedStore) -> Harness {
        let backend = Arc::new(backend);
        let store = Arc::new(store);
        let (tx, rx) = mpsc::channel();
        let pipeline = IntakePipeline::builder(config, store.clone())
            .backend(backend.clone())
            .announcements(tx)
            .build()
            .unwrap();
        Harness {
            pipeline,
            backend,
            store,
            events: rx,
        }
    }

    fn harness(store: ScriptedStore) -> Harness {
        harness_with(IntakeConfig::default(), MockBackend::new(), store)
    }

    #[tokio::test(start_paused = true)]
    async fn three_files_all_reach_done() {
        let h = harness(ScriptedStore::reliable());
        let outcomes = h
            .pipeline
            .add_files(vec![jpeg("a.jpg"), jpeg("b.jpg"), jpeg("c.jpg")])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
        let items = h.pipeline.snapshot();
        assert!(items.iter().all(|i| i.status == ItemStatus::Done));
        assert!(items.iter().all(|i| i.remote_url.is_some()));
        assert_eq!(h.pipeline.aggregate_percent(), 100);
        assert_eq!(h.pipeline.stored_objects().len(), 3);
        assert_eq!(h.events()[0], Announcement::Added(3));
    }

    #[tokio::test(start_paused = true)]
    async fn selection_beyond_room_is_truncated_with_warning() {
        let config = IntakeConfig {
            max_items: 4,
            ..IntakeConfig::default()
        };
        let h = harness_with(config, MockBackend::new(), ScriptedStore::reliable());
        h.pipeline.select(vec![jpeg("a"), jpeg("b")]).unwrap();
        h.events();

        let files: Vec<SelectedFile> = (0..12).map(|i| jpeg(&format!("{i}.jpg"))).collect();
        let ids = h.pipeline.select(files).unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(h.pipeline.snapshot().len(), 4);
        let names: Vec<String> = h.pipeline.snapshot().into_iter().map(|i| i.name).collect();
        assert_eq!(&names[2..], ["0.jpg", "1.jpg"]);
        assert_eq!(
            h.events(),
            vec![
                Announcement::CapacityReached {
                    max_items: 4,
                    ignored: 10
                },
                Announcement::Added(2),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn full_list_refuses_selection() {
        let config = IntakeConfig {
            max_items: 1,
            ..IntakeConfig::default()
        };
        let h = harness_with(config, MockBackend::new(), ScriptedStore::reliable());
        h.pipeline.select(vec![jpeg("a")]).unwrap();

        let err = h.pipeline.select(vec![jpeg("b")]).unwrap_err();
        assert!(matches!(err, IntakeError::CapacityExceeded { max_items: 1 }));
        assert_eq!(h.pipeline.snapshot().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_video_and_oversize_files_are_filtered() {
        let config = IntakeConfig {
            max_file_mb: 1,
            ..IntakeConfig::default()
        };
        let h = harness_with(config, MockBackend::new(), ScriptedStore::reliable());
        let files = vec![
            SelectedFile::new("empty.jpg", Some("image/jpeg"), Vec::new()),
            SelectedFile::new("throw.mov", Some("video/quicktime"), vec![1u8; 10]),
            SelectedFile::new("notes.pdf", Some("application/pdf"), vec![1u8; 10]),
            SelectedFile::new("huge.jpg", Some("image/jpeg"), vec![1u8; 1024 * 1024 + 1]),
            jpeg("ok.jpg"),
        ];
        let ids = h.pipeline.select(files).unwrap();

        assert_eq!(ids.len(), 1);
        let reasons: Vec<RejectReason> = h
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Announcement::Rejected { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![
                RejectReason::Empty,
                RejectReason::Video,
                RejectReason::NotAnImage,
                RejectReason::TooLarge { limit_mb: 1 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn processing_failure_skips_upload_and_spares_siblings() {
        let h = harness_with(
            IntakeConfig::default(),
            MockBackend::failing_on(b"bad.jpg"),
            ScriptedStore::reliable(),
        );
        let outcomes = h
            .pipeline
            .add_files(vec![jpeg("good.jpg"), jpeg("bad.jpg")])
            .await
            .unwrap();

        assert!(outcomes[0].1.is_ok());
        assert!(matches!(outcomes[1].1, Err(IntakeError::Processing(_))));
        let items = h.pipeline.snapshot();
        assert_eq!(items[0].status, ItemStatus::Done);
        assert_eq!(items[1].status, ItemStatus::Error);
        assert!(items[1].error.is_some());
        assert_eq!(h.store.primary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_upload_marks_error() {
        let h = harness(ScriptedStore::broken());
        let outcomes = h.pipeline.add_files(vec![jpeg("a.jpg")]).await.unwrap();

        assert!(matches!(
            outcomes[0].1,
            Err(IntakeError::Upload(UploadError::Exhausted { attempts: 3, .. }))
        ));
        let item = &h.pipeline.snapshot()[0];
        assert_eq!(item.status, ItemStatus::Error);
        assert!(item.error.as_deref().unwrap().contains("3 attempt"));
        assert!(h.events().iter().any(|e| matches!(e, Announcement::Failed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_seen_by_observers_is_monotonic() {
        let h = harness(ScriptedStore::reliable().with_delay(std::time::Duration::from_secs(2)));
        let seen: Arc<Mutex<Vec<u8>>> = Arc::default();
        let sink = Arc::clone(&seen);
        h.pipeline.subscribe(Box::new(move |items: &[UploadItem]| {
            if let Some(item) = items.first() {
                sink.lock().unwrap().push(item.progress_percent);
            }
        }));

        h.pipeline.add_files(vec![jpeg("a.jpg")]).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&crate::tracker::ADMITTED_PERCENT));
        assert!(seen.contains(&NORMALIZED_PERCENT));
        assert!(seen.contains(&TRANSFORMED_PERCENT));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn removal_during_upload_is_final() {
        let gate = Arc::new(Notify::new());
        let h = harness(ScriptedStore::reliable().gated(gate.clone()));
        let ids = h.pipeline.select(vec![jpeg("a.jpg")]).unwrap();
        let id = ids[0];

        let run = h.pipeline.process(id);
        let remove = async {
            // Wait until the upload is in flight
            while h.store.primary_calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
            assert!(h.pipeline.remove(id));
            gate.notify_one();
        };
        let (result, ()) = tokio::join!(run, remove);

        assert!(matches!(
            result,
            Err(IntakeError::Tracker(TrackerError::UnknownItem(_)))
        ));
        assert!(h.pipeline.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_keeps_done_items() {
        let h = harness(ScriptedStore::reliable());
        h.pipeline.add_files(vec![jpeg("done.jpg")]).await.unwrap();
        h.pipeline.select(vec![jpeg("pending.jpg")]).unwrap();

        let removed = h.pipeline.cancel_all();
        assert_eq!(removed.len(), 1);
        let items = h.pipeline.snapshot();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "done.jpg");
    }

    #[tokio::test(start_paused = true)]
    async fn re_edit_replaces_key_only_on_success() {
        let h = harness(ScriptedStore::reliable());
        let outcomes = h.pipeline.add_files(vec![jpeg("a.jpg")]).await.unwrap();
        let (id, first) = (outcomes[0].0, outcomes[0].1.as_ref().unwrap().clone());

        let spec = EditSpec {
            rotation: Rotation::Cw90,
            ..EditSpec::default()
        };
        let second = h.pipeline.apply_edit(id, spec).await.unwrap();

        assert_ne!(first.key, second.key);
        let item = h.pipeline.tracker().get(id).unwrap();
        assert_eq!(item.storage_key.as_deref(), Some(second.key.as_str()));
        let rotations: Vec<u16> = h
            .backend
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Transform { rotation, .. } => Some(rotation),
                _ => None,
            })
            .collect();
        assert_eq!(rotations, vec![0, 90]);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_reapply_hits_the_cache() {
        let h = harness(ScriptedStore::reliable());
        let outcomes = h.pipeline.add_files(vec![jpeg("a.jpg")]).await.unwrap();
        let id = outcomes[0].0;

        h.pipeline.apply_edit(id, EditSpec::default()).await.unwrap();
        assert_eq!(h.backend.get_operations().len(), 1);
        assert_eq!(h.pipeline.cache().stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn error_item_can_be_retried_by_reapplying() {
        let h = harness(ScriptedStore::primary_down().primary_ok_from(4));
        let outcomes = h.pipeline.add_files(vec![jpeg("a.jpg")]).await.unwrap();
        let id = outcomes[0].0;
        assert_eq!(h.pipeline.tracker().get(id).unwrap().status, ItemStatus::Error);

        let stored = h.pipeline.apply_edit(id, EditSpec::default()).await.unwrap();
        let item = h.pipeline.tracker().get(id).unwrap();
        assert_eq!(item.status, ItemStatus::Done);
        assert_eq!(item.error, None);
        assert_eq!(item.storage_key, Some(stored.key));
    }

    #[tokio::test(start_paused = true)]
    async fn initial_items_are_done_and_restorable() {
        let record = crate::types::RemoteRecord {
            url: "https://cdn.test/u/2026/01/01/1-abcdef.jpg".into(),
            key: "u/2026/01/01/1-abcdef.jpg".into(),
        };
        let config = IntakeConfig {
            initial_items: vec![record],
            ..IntakeConfig::default()
        };
        let h = harness_with(config, MockBackend::new(), ScriptedStore::reliable());
        let item = h.pipeline.snapshot()[0].clone();
        assert_eq!(item.status, ItemStatus::Done);
        assert!(!item.editable);
        assert!(matches!(
            h.pipeline.apply_edit(item.id, EditSpec::default()).await,
            Err(IntakeError::Tracker(TrackerError::NotEditable(_)))
        ));

        h.pipeline
            .restore_source(item.id, Bytes::from_static(b"fetched"))
            .unwrap();
        let stored = h.pipeline.apply_edit(item.id, EditSpec::default()).await.unwrap();
        assert_ne!(stored.key, "u/2026/01/01/1-abcdef.jpg");
    }

    #[tokio::test]
    async fn editor_opens_on_real_image() {
        let h = harness(ScriptedStore::reliable());
        let file = SelectedFile::new("disc.jpg", Some("image/jpeg"), jpeg_bytes(800, 600));
        let outcomes = h.pipeline.add_files(vec![file]).await.unwrap();
        let id = outcomes[0].0;

        let mut session = h.pipeline.open_editor(id).await.unwrap();
        assert_eq!(session.renderer().source_dimensions(), (800, 600));
        session.rotate_cw();
        let (edited, spec) = session.apply();
        assert_eq!(edited, id);
        assert_eq!(spec.rotation, Rotation::Cw90);
    }
}
