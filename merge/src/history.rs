//! Resolution history tracking.

use crate::{ConflictResolution, ConflictType, Key, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One recorded resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictHistoryEntry {
    /// When the resolution happened (milliseconds since epoch)
    pub timestamp: Timestamp,
    /// The conflicted key
    pub key: Key,
    /// How the conflict was classified
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    /// The resolution that was produced
    pub resolution: ConflictResolution,
    /// Whether the resolution was produced without host intervention
    pub automatic: bool,
}

/// Capped log of resolutions. The newest entries are preserved; the oldest
/// are dropped once the capacity is exceeded.
#[derive(Debug, Clone, Default)]
pub struct ConflictHistory {
    entries: VecDeque<ConflictHistoryEntry>,
    capacity: usize,
}

impl ConflictHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append an entry, trimming from the front when over capacity.
    pub fn record(&mut self, entry: ConflictHistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// The most recent entries, in chronological order. `None` returns all.
    pub fn recent(&self, limit: Option<usize>) -> Vec<ConflictHistoryEntry> {
        let take = limit.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries
            .iter()
            .skip(self.entries.len() - take)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
