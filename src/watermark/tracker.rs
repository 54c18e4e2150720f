//! Selection of genuinely new entries against a watermark.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{WatermarkState, DEFAULT_SEEN_CAPACITY};
use crate::feed::{DateFormat, FeedEntry};

/// How far to look once an entry at or below the watermark shows up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Check every entry; old ones are skipped individually.
    #[default]
    Full,
    /// Stop at the first entry that is not newer than the watermark.
    /// Only correct for feeds that are strictly newest-first.
    StopAtWatermark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerOptions {
    pub date_format: DateFormat,
    pub scan_mode: ScanMode,
    pub seen_capacity: usize,
}

impl TrackerOptions {
    pub fn new(date_format: DateFormat) -> Self {
        Self {
            date_format,
            scan_mode: ScanMode::default(),
            seen_capacity: DEFAULT_SEEN_CAPACITY,
        }
    }

    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    pub fn with_seen_capacity(mut self, seen_capacity: usize) -> Self {
        self.seen_capacity = seen_capacity;
        self
    }
}

/// Result of [`select_new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// New entries in feed order.
    pub new: Vec<FeedEntry>,
    /// State to commit once every new entry has been published.
    pub state: WatermarkState,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty()
    }
}

/// Pick the entries that have not been acted upon yet.
///
/// The returned state is unchanged when nothing new was found.
pub fn select_new(
    entries: Vec<FeedEntry>,
    state: &WatermarkState,
    options: &TrackerOptions,
) -> Selection {
    let mut new = Vec::new();
    let mut batch_ids = HashSet::new();
    let mut candidate: Option<DateTime<Utc>> = None;

    for entry in entries {
        let Some(published) = options.date_format.parse(&entry.published) else {
            warn!(
                id = %entry.id,
                published = %entry.published,
                "Skipping entry with unparseable timestamp"
            );
            continue;
        };

        if let Some(newest) = state.newest {
            if published <= newest {
                match options.scan_mode {
                    ScanMode::StopAtWatermark => break,
                    ScanMode::Full => continue,
                }
            }
        }

        if state.has_seen(&entry.id) || !batch_ids.insert(entry.id.clone()) {
            debug!(id = %entry.id, "Skipping already seen entry");
            continue;
        }

        candidate = Some(candidate.map_or(published, |c| c.max(published)));
        new.push(entry);
    }

    if new.is_empty() {
        return Selection {
            new,
            state: state.clone(),
        };
    }

    let mut updated = state.clone();
    // Oldest first, so the newest ids survive eviction.
    for entry in new.iter().rev() {
        updated.remember(entry.id.clone(), options.seen_capacity);
    }
    updated.newest = match (state.newest, candidate) {
        (Some(old), Some(c)) => Some(old.max(c)),
        (old, c) => c.or(old),
    };

    Selection {
        new,
        state: updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: &str, published: &str) -> FeedEntry {
        FeedEntry::new(id, format!("Title {id}"), published)
    }

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn options() -> TrackerOptions {
        TrackerOptions::new(DateFormat::Rfc3339)
    }

    fn two_entries() -> Vec<FeedEntry> {
        vec![
            entry("a", "2024-01-02T00:00:00Z"),
            entry("b", "2024-01-01T00:00:00Z"),
        ]
    }

    fn ids(selection: &Selection) -> Vec<&str> {
        selection.new.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_empty_state_selects_everything() {
        let selection = select_new(two_entries(), &WatermarkState::default(), &options());
        assert_eq!(ids(&selection), vec!["a", "b"]);
        assert_eq!(selection.state.newest, Some(ts(2024, 1, 2)));
        assert!(selection.state.has_seen("a"));
        assert!(selection.state.has_seen("b"));
    }

    #[test]
    fn test_watermark_excludes_older_entries() {
        let state = WatermarkState {
            seen: Default::default(),
            newest: Some(ts(2024, 1, 1)),
        };
        let selection = select_new(two_entries(), &state, &options());
        assert_eq!(ids(&selection), vec!["a"]);
        assert_eq!(selection.state.newest, Some(ts(2024, 1, 2)));
    }

    #[test]
    fn test_rebroadcast_of_seen_id_is_excluded() {
        let mut state = WatermarkState {
            seen: Default::default(),
            newest: Some(ts(2024, 1, 1)),
        };
        state.remember("a", 10);
        let selection = select_new(two_entries(), &state, &options());
        assert!(selection.is_empty());
        assert_eq!(selection.state, state);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let first = select_new(two_entries(), &WatermarkState::default(), &options());
        let second = select_new(two_entries(), &first.state, &options());
        assert!(second.is_empty());
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn test_empty_input_is_noop() {
        let state = WatermarkState {
            seen: Default::default(),
            newest: Some(ts(2024, 1, 1)),
        };
        let selection = select_new(Vec::new(), &state, &options());
        assert!(selection.is_empty());
        assert_eq!(selection.state, state);
    }

    #[test]
    fn test_watermark_never_moves_backwards() {
        let mut state = WatermarkState {
            seen: Default::default(),
            newest: Some(ts(2024, 1, 1)),
        };
        state.remember("old", 10);
        // An unseen id that is older than the watermark cannot lower it.
        let entries = vec![
            entry("late", "2023-12-01T00:00:00Z"),
            entry("fresh", "2024-02-01T00:00:00Z"),
        ];
        let selection = select_new(entries, &state, &options());
        assert_eq!(ids(&selection), vec!["fresh"]);
        assert!(selection.state.newest >= state.newest);
        assert_eq!(selection.state.newest, Some(ts(2024, 2, 1)));
    }

    #[test]
    fn test_full_scan_finds_out_of_order_entries() {
        let state = WatermarkState {
            seen: Default::default(),
            newest: Some(ts(2024, 1, 2)),
        };
        let entries = vec![
            entry("old", "2024-01-01T00:00:00Z"),
            entry("backfilled", "2024-01-05T00:00:00Z"),
        ];

        let full = select_new(entries.clone(), &state, &options());
        assert_eq!(ids(&full), vec!["backfilled"]);

        let short = select_new(
            entries,
            &state,
            &options().with_scan_mode(ScanMode::StopAtWatermark),
        );
        assert!(short.is_empty());
    }

    #[test]
    fn test_unparseable_timestamp_is_skipped() {
        let entries = vec![
            entry("bad", "yesterday"),
            entry("good", "2024-01-01T00:00:00Z"),
        ];
        let selection = select_new(entries, &WatermarkState::default(), &options());
        assert_eq!(ids(&selection), vec!["good"]);
        assert!(!selection.state.has_seen("bad"));
    }

    #[test]
    fn test_duplicate_ids_within_batch() {
        let entries = vec![
            entry("a", "2024-01-02T00:00:00Z"),
            entry("a", "2024-01-02T00:00:00Z"),
        ];
        let selection = select_new(entries, &WatermarkState::default(), &options());
        assert_eq!(ids(&selection), vec!["a"]);
    }

    #[test]
    fn test_rfc2822_feed() {
        let entries = vec![
            entry("p2", "Tue, 02 Jan 2024 00:00:00 GMT"),
            entry("p1", "Mon, 01 Jan 2024 00:00:00 GMT"),
        ];
        let state = WatermarkState {
            seen: Default::default(),
            newest: Some(ts(2024, 1, 1)),
        };
        let selection = select_new(entries, &state, &TrackerOptions::new(DateFormat::Rfc2822));
        assert_eq!(ids(&selection), vec!["p2"]);
    }

    #[test]
    fn test_newest_ids_survive_eviction() {
        let entries = vec![
            entry("c", "2024-01-03T00:00:00Z"),
            entry("b", "2024-01-02T00:00:00Z"),
            entry("a", "2024-01-01T00:00:00Z"),
        ];
        let selection = select_new(
            entries,
            &WatermarkState::default(),
            &options().with_seen_capacity(2),
        );
        assert_eq!(selection.new.len(), 3);
        assert!(selection.state.has_seen("c"));
        assert!(selection.state.has_seen("b"));
        assert!(!selection.state.has_seen("a"));
    }
}
