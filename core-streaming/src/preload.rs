//! # Range Presence Tracker
//!
//! Records which byte intervals of which track have already been fetched, so
//! the coordinator can short-circuit preloads that would duplicate a request
//! for the identical `(start, end)` pair.
//!
//! Membership is exact-match only: overlapping but differently bounded
//! ranges are distinct entries and will each trigger their own fetch. This
//! is a documented simplification; an interval-merge structure could replace
//! the key set without changing the public contract.

use crate::metadata::TrackId;
use bridge_traits::http::ByteRange;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Per-track membership cache of already-requested byte ranges.
#[derive(Default)]
pub struct RangePresenceTracker {
    ranges: Mutex<HashMap<TrackId, HashSet<String>>>,
}

impl RangePresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the identical range was already fetched for `id`.
    pub fn has_preloaded(&self, id: &TrackId, range: ByteRange) -> bool {
        self.ranges
            .lock()
            .get(id)
            .map(|set| set.contains(&range.key()))
            .unwrap_or(false)
    }

    /// Record that `range` has been fetched for `id`.
    pub fn mark_preloaded(&self, id: &TrackId, range: ByteRange) {
        self.ranges
            .lock()
            .entry(id.clone())
            .or_default()
            .insert(range.key());
    }

    /// Number of distinct ranges recorded for `id`.
    pub fn preloaded_count(&self, id: &TrackId) -> usize {
        self.ranges.lock().get(id).map(|set| set.len()).unwrap_or(0)
    }

    /// Drop all recorded ranges, for every track.
    pub fn clear(&self) {
        self.ranges.lock().clear();
    }
}
