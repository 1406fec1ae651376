//! Storage items and their metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tether_merge::{stable_hash, Key, Timestamp, Value};

/// Metadata associated with a stored item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// The item's key
    pub key: Key,
    /// Approximate payload size in bytes
    pub size: u64,
    /// When the item was first created (milliseconds since epoch)
    pub created_at: Timestamp,
    /// When the item was last updated (milliseconds since epoch)
    pub updated_at: Timestamp,
    /// Free-form labels
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Whether the stored payload is compressed
    #[serde(default)]
    pub compressed: bool,
    /// Whether the stored payload is encrypted
    #[serde(default)]
    pub encrypted: bool,
}

impl Metadata {
    /// Create metadata for a newly written item.
    pub fn new(key: impl Into<Key>, size: u64, timestamp: Timestamp) -> Self {
        Self {
            key: key.into(),
            size,
            created_at: timestamp,
            updated_at: timestamp,
            tags: BTreeSet::new(),
            compressed: false,
            encrypted: false,
        }
    }

    /// Create metadata sized from the value itself.
    pub fn for_value(key: impl Into<Key>, value: &Value, timestamp: Timestamp) -> Self {
        Self::new(key, value_size(value), timestamp)
    }

    /// Record a modification.
    pub fn touch(&mut self, timestamp: Timestamp, size: u64) {
        self.updated_at = timestamp;
        self.size = size;
    }
}

/// A keyed value together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageItem {
    pub key: Key,
    pub value: Value,
    pub metadata: Metadata,
}

impl StorageItem {
    pub fn new(key: impl Into<Key>, value: Value, metadata: Metadata) -> Self {
        Self {
            key: key.into(),
            value,
            metadata,
        }
    }
}

/// Approximate size of a value, measured on its canonical serialization.
pub fn value_size(value: &Value) -> u64 {
    stable_hash(value).len() as u64
}
