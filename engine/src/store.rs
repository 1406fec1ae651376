//! The local storage capability.

use crate::error::Result;
use crate::item::Metadata;
use async_trait::async_trait;
use tether_merge::Value;

/// Reserved key the offline queue persists under.
pub const QUEUE_KEY: &str = "__cloud_sync_queue__";

/// Reserved key the engine's sync state persists under.
pub const STATE_KEY: &str = "__cloud_sync_state__";

/// Whether a key belongs to the engine rather than the application.
pub fn is_reserved_key(key: &str) -> bool {
    key == QUEUE_KEY || key == STATE_KEY
}

/// The local storage engine, as consumed by the sync engine.
///
/// The engine shares the store with the application and reserves only
/// [`QUEUE_KEY`] and [`STATE_KEY`]. Reserved keys are never reconciled.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read a value, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, updating its metadata timestamps.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All stored keys, reserved keys included.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Metadata for a key, `None` when absent or untracked by the store.
    async fn metadata(&self, key: &str) -> Result<Option<Metadata>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys() {
        assert!(is_reserved_key(QUEUE_KEY));
        assert!(is_reserved_key(STATE_KEY));
        assert!(!is_reserved_key("user:1"));
        assert!(!is_reserved_key("__cloud_sync"));
    }
}
