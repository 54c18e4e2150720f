//! Watermark state: what a feed source has already acted upon.
//!
//! Two signals are kept together per source: a bounded set of identifiers
//! already published and the newest publish timestamp processed so far.

pub mod store;
pub mod tracker;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use store::{FileWatermarkStore, MemoryWatermarkStore, SqliteWatermarkStore, WatermarkStore};
pub use tracker::{select_new, ScanMode, Selection, TrackerOptions};

/// Default number of identifiers remembered per feed source.
pub const DEFAULT_SEEN_CAPACITY: usize = 500;

/// Persisted per-source dedup state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkState {
    /// Identifiers already acted upon, oldest first.
    #[serde(default)]
    pub seen: VecDeque<String>,
    /// Newest publish timestamp processed so far.
    #[serde(default)]
    pub newest: Option<DateTime<Utc>>,
}

impl WatermarkState {
    /// True when the source has never recorded anything.
    pub fn is_fresh(&self) -> bool {
        self.newest.is_none() && self.seen.is_empty()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.iter().any(|seen| seen == id)
    }

    /// Record an identifier, evicting the oldest ones beyond `capacity`.
    pub fn remember(&mut self, id: impl Into<String>, capacity: usize) {
        let id = id.into();
        if self.has_seen(&id) {
            return;
        }
        self.seen.push_back(id);
        while self.seen.len() > capacity {
            self.seen.pop_front();
        }
    }
}
