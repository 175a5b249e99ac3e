//! Object key construction.
//!
//! Keys are scoped under the owner and partitioned by UTC date:
//!
//! ```text
//! {owner}/{yyyy}/{mm}/{dd}/{unix_ms}-{rand6}[-a{n}][-signed].{ext}
//! ```
//!
//! The timestamp and random part are fixed once per upload; each retry
//! attempt after the first and each fallback write gets its own suffix, so
//! no two writes of one upload target the same key.

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

const RANDOM_LEN: usize = 6;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// The attempt-independent part of an object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBase {
    owner: String,
    date: (i32, u32, u32),
    timestamp_ms: i64,
    random: String,
}

impl KeyBase {
    pub fn new<R: Rng + ?Sized>(owner: &str, now: DateTime<Utc>, rng: &mut R) -> Self {
        let random = (0..RANDOM_LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Self {
            owner: sanitize_owner(owner),
            date: (now.year(), now.month(), now.day()),
            timestamp_ms: now.timestamp_millis(),
            random,
        }
    }

    /// Key for the current time and the thread-local RNG.
    pub fn now(owner: &str) -> Self {
        Self::new(owner, Utc::now(), &mut rand::rng())
    }

    /// Full key for one write. `attempt` is 1-based.
    pub fn key(&self, attempt: u32, signed: bool, extension: &str) -> String {
        let (year, month, day) = self.date;
        let mut key = format!(
            "{}/{:04}/{:02}/{:02}/{}-{}",
            self.owner, year, month, day, self.timestamp_ms, self.random
        );
        if attempt > 1 {
            key.push_str(&format!("-a{}", attempt));
        }
        if signed {
            key.push_str("-signed");
        }
        key.push('.');
        key.push_str(extension.trim_start_matches('.'));
        key
    }
}

/// Owner ids become one path segment.
fn sanitize_owner(owner: &str) -> String {
    let cleaned: String = owner
        .trim_matches('/')
        .chars()
        .map(|c| if c == '/' || c.is_whitespace() { '-' } else { c })
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}
