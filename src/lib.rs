//! # disc-intake
//!
//! Image intake and upload pipeline for disc-golf classified listings.
//! Phone photos go in; framed, resized JPEGs stored in object storage come
//! out, with a per-image lifecycle the listing form can display and persist.
//!
//! # Architecture: One Pipeline, Six Parts
//!
//! ```text
//! select ─→ normalize ─→ transform (worker) ─→ upload ─→ done
//!   │                         ▲                  │
//!   │                 preview / re-edit          │
//!   └──────────────→ item tracker ←──────────────┘
//! ```
//!
//! Each selected file becomes an item that runs through the stages strictly
//! in order. Items run concurrently and fail independently. The tracker is
//! the only shared state; it reports the full item list to observers after
//! every change.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`intake`] | Capture adapter and per-item orchestration (`IntakePipeline`) |
//! | [`normalize`] | Best-effort conversion of HEIC/HEIF to JPEG |
//! | [`imaging`] | Crop/rotate/cover geometry and the `image`-crate backend |
//! | [`worker`] | Off-thread transform engine on a FIFO rayon pool |
//! | [`preview`] | Live preview renderer and the editor session |
//! | [`upload`] | Retry policy, object keys, storage trait and backends |
//! | [`tracker`] | Item list, state machine, progress, observers |
//! | [`cache`] | Session cache of transform outputs |
//! | [`config`] | `intake.toml` loading, merging and validation |
//! | [`types`] | Items and records shared with the embedding page |
//! | [`naming`] | Display names and content-type detection |
//! | [`output`] | CLI formatting of items and announcements |
//!
//! # Design Decisions
//!
//! ## One Geometry, Two Renderers
//!
//! The final encode and the live preview both call
//! [`imaging::plan_transform`] and [`imaging::render_plan`]. They differ only
//! in the output box and the resampling filter, so what the user frames is
//! what gets uploaded.
//!
//! ## Materialized Uploads
//!
//! Processed images are handed to storage as complete in-memory
//! [`bytes::Bytes`] buffers, never as streams. A retry reuses the same
//! buffer without re-encoding.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, EXIF orientation, resampling and JPEG encoding all come from the
//! `image` crate. There are no system image libraries to install.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod intake;
pub mod naming;
pub mod normalize;
pub mod output;
pub mod preview;
pub mod tracker;
pub mod types;
pub mod upload;
pub mod worker;

pub use intake::{Announcement, IntakeError, IntakePipeline};
pub use types::{ItemId, ItemStatus, SelectedFile, StoredObject, UploadItem};

#[cfg(test)]
pub(crate) mod test_helpers;
