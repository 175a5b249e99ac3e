//! Item State Tracker.
//!
//! Owns the ordered item list and every item's local source bytes. All
//! mutations go through one lock as a read-modify-write keyed by
//! [`ItemId`], so racing completions never lose each other's updates.
//!
//! ## Rules enforced here
//!
//! - The list never grows past `max_items`; nothing is evicted to make room.
//! - Status changes follow [`ItemStatus::can_transition_to`]; illegal ones
//!   are refused and logged.
//! - Progress never decreases within one attempt. Re-entering `processing`
//!   from `done` or `error` starts a new attempt and resets it.
//! - Updates for an id that is no longer listed are no-ops, so a removed
//!   item can never reappear.
//!
//! ## Observers
//!
//! After every mutation each observer receives the full snapshot, in
//! mutation order. Callbacks run with no tracker lock held, so they may
//! read the tracker, mutate it, subscribe or unsubscribe. A mutation made
//! while snapshots are being delivered is queued behind them and delivered
//! by the thread already delivering; its own call returns without waiting.

use crate::types::{ItemId, ItemStatus, RemoteRecord, SelectedFile, StoredObject, UploadItem};
use bytes::Bytes;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Placeholder progress shown the moment an item is admitted.
pub const ADMITTED_PERCENT: u8 = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("no item {0}")]
    UnknownItem(ItemId),
    #[error("{0} has no local source to edit")]
    NotEditable(ItemId),
    #[error("{0} is still {1}")]
    Busy(ItemId, &'static str),
}

pub type Observer = Box<dyn Fn(&[UploadItem]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Outcome of offering files to the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Free slots before this admission.
    pub room: usize,
    /// Ids of the created items, in the order the files were offered.
    pub admitted: Vec<ItemId>,
    /// Files turned away for lack of room.
    pub ignored: usize,
}

struct Entry {
    item: UploadItem,
    source: Option<Bytes>,
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
    next_id: u64,
}

impl State {
    fn allocate(&mut self) -> ItemId {
        self.next_id += 1;
        ItemId(self.next_id)
    }

    fn entry_mut(&mut self, id: ItemId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.item.id == id)
    }

    fn snapshot(&self) -> Vec<UploadItem> {
        self.entries.iter().map(|e| e.item.clone()).collect()
    }
}

type SharedObserver = Arc<dyn Fn(&[UploadItem]) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    list: Vec<(SubscriptionId, SharedObserver)>,
}

/// Snapshots waiting for delivery, oldest first.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Vec<UploadItem>>,
    delivering: bool,
}

/// Clears the delivering flag if an observer panics mid-delivery.
struct DeliveryGuard<'a>(&'a Mutex<Outbox>);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut outbox = lock(self.0);
            outbox.delivering = false;
            outbox.queue.clear();
        }
    }
}

pub struct ItemTracker {
    max_items: usize,
    state: Mutex<State>,
    observers: Mutex<Observers>,
    outbox: Mutex<Outbox>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mean progress over `items`, rounded; `done` counts as 100, empty is 0.
pub fn aggregate_percent(items: &[UploadItem]) -> u8 {
    if items.is_empty() {
        return 0;
    }
    let total: u32 = items
        .iter()
        .map(|item| match item.status {
            ItemStatus::Done => 100,
            _ => u32::from(item.progress_percent.min(100)),
        })
        .sum();
    let count = items.len() as u32;
    ((total + count / 2) / count) as u8
}

impl ItemTracker {
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items,
            state: Mutex::new(State::default()),
            observers: Mutex::new(Observers::default()),
            outbox: Mutex::new(Outbox::default()),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots left under `max_items`.
    pub fn room(&self) -> usize {
        self.max_items.saturating_sub(self.len())
    }

    pub fn snapshot(&self) -> Vec<UploadItem> {
        lock(&self.state).snapshot()
    }

    pub fn get(&self, id: ItemId) -> Option<UploadItem> {
        lock(&self.state)
            .entries
            .iter()
            .find(|e| e.item.id == id)
            .map(|e| e.item.clone())
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Local source bytes of `id`, if still held.
    pub fn source(&self, id: ItemId) -> Option<Bytes> {
        lock(&self.state)
            .entries
            .iter()
            .find(|e| e.item.id == id)
            .and_then(|e| e.source.clone())
    }

    pub fn aggregate_percent(&self) -> u8 {
        aggregate_percent(&self.snapshot())
    }

    /// The `{url, key}` list the embedding page persists, in display order.
    pub fn stored_objects(&self) -> Vec<StoredObject> {
        lock(&self.state)
            .entries
            .iter()
            .filter_map(|e| e.item.stored())
            .collect()
    }

    pub fn subscribe(&self, observer: Observer) -> SubscriptionId {
        let mut observers = lock(&self.observers);
        observers.next_id += 1;
        let id = SubscriptionId(observers.next_id);
        observers.list.push((id, Arc::from(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.list.len();
        observers.list.retain(|(sid, _)| *sid != id);
        observers.list.len() != before
    }

    /// Run `mutate` under the lock; notify observers if it changed anything.
    ///
    /// The snapshot is queued before the state lock is released, so the
    /// queue order is the mutation order. The outbox lock is only ever
    /// taken after the state lock, and no lock is held while observers run.
    fn commit<R>(&self, mutate: impl FnOnce(&mut State) -> (bool, R)) -> R {
        let mut state = lock(&self.state);
        let (changed, result) = mutate(&mut state);
        if !changed {
            return result;
        }
        let deliver = {
            let mut outbox = lock(&self.outbox);
            outbox.queue.push_back(state.snapshot());
            !std::mem::replace(&mut outbox.delivering, true)
        };
        drop(state);
        if deliver {
            self.deliver();
        }
        result
    }

    /// Drain the outbox, one snapshot to every current observer at a time.
    fn deliver(&self) {
        let _guard = DeliveryGuard(&self.outbox);
        loop {
            let snapshot = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(snapshot) => snapshot,
                    None => {
                        outbox.delivering = false;
                        return;
                    }
                }
            };
            let observers: Vec<SharedObserver> = lock(&self.observers)
                .list
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect();
            for observer in &observers {
                observer(&snapshot);
            }
        }
    }

    /// Create `processing` items for as many `files` as fit, in order.
    pub fn admit(&self, files: Vec<SelectedFile>) -> Admission {
        let max_items = self.max_items;
        self.commit(|state| {
            let room = max_items.saturating_sub(state.entries.len());
            let offered = files.len();
            let mut admitted = Vec::new();
            for file in files.into_iter().take(room) {
                let id = state.allocate();
                let mut item = UploadItem::local(id, file.name.clone(), file.size_bytes());
                item.status = ItemStatus::Processing;
                item.progress_percent = ADMITTED_PERCENT;
                state.entries.push(Entry {
                    item,
                    source: Some(file.bytes),
                });
                admitted.push(id);
            }
            let admission = Admission {
                room,
                ignored: offered - admitted.len(),
                admitted,
            };
            (!admission.admitted.is_empty(), admission)
        })
    }

    /// Synthesize `done`, non-editable items from stored records.
    pub fn insert_remote(&self, records: &[RemoteRecord]) -> Vec<ItemId> {
        let max_items = self.max_items;
        self.commit(|state| {
            let room = max_items.saturating_sub(state.entries.len());
            let mut ids = Vec::new();
            for record in records.iter().take(room) {
                let id = state.allocate();
                state.entries.push(Entry {
                    item: UploadItem::remote(id, record),
                    source: None,
                });
                ids.push(id);
            }
            if records.len() > ids.len() {
                warn!(
                    "{} stored item(s) dropped: list is full",
                    records.len() - ids.len()
                );
            }
            (!ids.is_empty(), ids)
        })
    }

    /// Raise the progress of `id`. Lower values are ignored.
    pub fn set_progress(&self, id: ItemId, percent: u8) -> bool {
        self.commit(|state| match state.entry_mut(id) {
            Some(entry) if percent.min(100) > entry.item.progress_percent => {
                entry.item.progress_percent = percent.min(100);
                (true, true)
            }
            _ => (false, false),
        })
    }

    /// Move `id` to `next`, raising progress to `percent`.
    ///
    /// Returns false when the item is gone or the transition is illegal.
    pub fn transition(&self, id: ItemId, next: ItemStatus, percent: u8) -> bool {
        self.commit(|state| {
            let Some(entry) = state.entry_mut(id) else {
                debug!("{} is gone; ignoring move to {}", id, next.label());
                return (false, false);
            };
            let item = &mut entry.item;
            if !item.status.can_transition_to(next) {
                warn!(
                    "{}: refusing {} -> {}",
                    id,
                    item.status.label(),
                    next.label()
                );
                return (false, false);
            }
            let new_attempt = next == ItemStatus::Processing
                && matches!(item.status, ItemStatus::Done | ItemStatus::Error);
            item.progress_percent = if new_attempt {
                percent.min(100)
            } else {
                item.progress_percent.max(percent.min(100))
            };
            if next != ItemStatus::Error {
                item.error = None;
            }
            item.status = next;
            (true, true)
        })
    }

    /// Record a successful upload: `done`, 100%, new url and key.
    pub fn complete(&self, id: ItemId, stored: StoredObject) -> bool {
        self.commit(|state| {
            let Some(entry) = state.entry_mut(id) else {
                debug!("{} was removed before its upload finished", id);
                return (false, false);
            };
            let item = &mut entry.item;
            if !item.status.can_transition_to(ItemStatus::Done) {
                warn!("{}: refusing {} -> done", id, item.status.label());
                return (false, false);
            }
            item.status = ItemStatus::Done;
            item.progress_percent = 100;
            item.remote_url = Some(stored.url);
            item.storage_key = Some(stored.key);
            item.error = None;
            (true, true)
        })
    }

    /// Move `id` to `error` with a reason. Any previous url/key is kept.
    pub fn fail(&self, id: ItemId, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.commit(|state| {
            let Some(entry) = state.entry_mut(id) else {
                return (false, false);
            };
            let item = &mut entry.item;
            if !item.status.can_transition_to(ItemStatus::Error) {
                warn!("{}: refusing {} -> error", id, item.status.label());
                return (false, false);
            }
            item.status = ItemStatus::Error;
            item.error = Some(reason);
            (true, true)
        })
    }

    /// Start a new processing attempt for an idle item with local bytes.
    ///
    /// Returns the source to transform. The previous url/key stay in place
    /// until the new upload succeeds.
    pub fn begin_edit(&self, id: ItemId) -> Result<Bytes, TrackerError> {
        self.commit(|state| {
            let Some(entry) = state.entry_mut(id) else {
                return (false, Err(TrackerError::UnknownItem(id)));
            };
            let Some(source) = entry.source.clone() else {
                return (false, Err(TrackerError::NotEditable(id)));
            };
            let status = entry.item.status;
            if !matches!(status, ItemStatus::Done | ItemStatus::Error) {
                return (false, Err(TrackerError::Busy(id, status.label())));
            }
            entry.item.status = ItemStatus::Processing;
            entry.item.progress_percent = ADMITTED_PERCENT;
            entry.item.error = None;
            (true, Ok(source))
        })
    }

    /// Re-attach local bytes to an item, making it editable again.
    pub fn restore_source(&self, id: ItemId, bytes: Bytes) -> Result<(), TrackerError> {
        self.commit(|state| match state.entry_mut(id) {
            Some(entry) => {
                entry.item.size_bytes = bytes.len() as u64;
                entry.source = Some(bytes);
                entry.item.editable = true;
                (true, Ok(()))
            }
            None => (false, Err(TrackerError::UnknownItem(id))),
        })
    }

    /// Remove `id` unconditionally, dropping its local bytes.
    pub fn remove(&self, id: ItemId) -> bool {
        self.commit(|state| {
            let before = state.entries.len();
            state.entries.retain(|e| e.item.id != id);
            let removed = state.entries.len() != before;
            (removed, removed)
        })
    }

    /// Remove every item that is not `done`. Returns the removed ids.
    pub fn cancel_pending(&self) -> Vec<ItemId> {
        self.commit(|state| {
            let mut removed = Vec::new();
            state.entries.retain(|e| {
                let keep = e.item.status == ItemStatus::Done;
                if !keep {
                    removed.push(e.item.id);
                }
                keep
            });
            (!removed.is_empty(), removed)
        })
    }
}
