//! CLI output formatting for the intake pipeline.
//!
//! # Information-First Display
//!
//! Every item leads with its positional index, display name, status and
//! progress. Storage details are shown as indented context lines so the
//! listing reads as an inventory of the listing's photos.
//!
//! # Output Format
//!
//! ## Items
//!
//! ```text
//! 001 putter.jpg  done 100%
//!     Key: seller-9/2026/03/04/1772625600000-k3j9zq.jpg
//!     URL: https://.../listing-images/seller-9/2026/03/04/1772625600000-k3j9zq.jpg
//! 002 driver.heic  error 15%
//!     Error: Processing failed: Failed to decode image: ...
//!
//! 2 images, 58% complete
//! ```
//!
//! ## Announcements
//!
//! ```text
//! Added 2 images
//! You can add up to 10 images; 3 ignored
//! Skipped clip.mov: videos are not supported
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::intake::{Announcement, RejectReason};
use crate::tracker::aggregate_percent;
use crate::types::{ItemStatus, UploadItem};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// Header line for one item: index, name, status, progress.
fn item_header(index: usize, item: &UploadItem) -> String {
    format!(
        "{} {}  {} {}%",
        format_index(index),
        item.name,
        item.status.label(),
        item.progress_percent
    )
}

/// Format the item list with a closing summary line.
pub fn format_items(items: &[UploadItem]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, item) in items.iter().enumerate() {
        lines.push(item_header(i + 1, item));
        if let Some(key) = &item.storage_key {
            lines.push(format!("{}Key: {}", indent(1), key));
        }
        if let Some(url) = &item.remote_url {
            lines.push(format!("{}URL: {}", indent(1), url));
        }
        if item.status == ItemStatus::Error
            && let Some(error) = &item.error
        {
            lines.push(format!("{}Error: {}", indent(1), error));
        }
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{}, {}% complete",
        plural(items.len(), "image"),
        aggregate_percent(items)
    ));
    lines
}

pub fn print_items(items: &[UploadItem]) {
    for line in format_items(items) {
        println!("{}", line);
    }
}

fn reject_reason(reason: &RejectReason) -> String {
    match reason {
        RejectReason::Empty => "file is empty".to_string(),
        RejectReason::Video => "videos are not supported".to_string(),
        RejectReason::NotAnImage => "not an image".to_string(),
        RejectReason::TooLarge { limit_mb } => format!("larger than {} MB", limit_mb),
    }
}

/// One announcement as a single sentence.
pub fn format_announcement(announcement: &Announcement) -> String {
    match announcement {
        Announcement::Added(n) => format!("Added {}", plural(*n, "image")),
        Announcement::CapacityReached { max_items, ignored } => {
            format!("You can add up to {} images; {} ignored", max_items, ignored)
        }
        Announcement::Rejected { name, reason } => {
            format!("Skipped {}: {}", name, reject_reason(reason))
        }
        Announcement::Failed { name, reason, .. } => format!("{} failed: {}", name, reason),
        Announcement::Completed { name, .. } => format!("{} uploaded", name),
        Announcement::Removed(n) => format!("Removed {}", plural(*n, "image")),
    }
}
