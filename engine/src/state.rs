//! Sync state, its persisted subset, and the version vector.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tether_merge::{Timestamp, Value};

/// Per-replica monotone counters.
///
/// Maintained and persisted but never interpreted; the slot is reserved for
/// future causality tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionVector {
    counters: BTreeMap<String, u64>,
}

impl VersionVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump this replica's counter and return the new value.
    pub fn observe(&mut self, replica: &str) -> u64 {
        let counter = self.counters.entry(replica.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Pointwise maximum with another vector.
    pub fn merge(&mut self, other: &VersionVector) {
        for (replica, &counter) in &other.counters {
            let entry = self.counters.entry(replica.clone()).or_insert(0);
            *entry = (*entry).max(counter);
        }
    }

    pub fn counter(&self, replica: &str) -> u64 {
        self.counters.get(replica).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

/// Process-wide sync state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Last successful reconciliation (milliseconds since epoch)
    pub last_sync: Timestamp,
    /// Reentrancy guard mirror
    pub is_syncing: bool,
    /// Last observed connectivity
    pub is_connected: bool,
    /// Offline queue size mirror
    pub pending_changes: usize,
    /// Reserved causality slot
    pub version_vector: VersionVector,
}

/// The subset of [`SyncState`] persisted to the local store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub last_sync: Timestamp,
    #[serde(default)]
    pub version_vector: VersionVector,
}

impl PersistedState {
    pub fn to_value(&self) -> Result<Value> {
        Ok(Value::from(serde_json::to_value(self)?))
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let json: serde_json::Value = value.clone().into();
        Ok(serde_json::from_value(json)?)
    }
}
