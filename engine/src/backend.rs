//! The remote backend capability.

use crate::error::Result;
use crate::item::{Metadata, StorageItem};
use async_trait::async_trait;
use std::fmt;
use tether_merge::{Timestamp, Value};
use tokio::sync::mpsc;

/// Channel end a backend pushes change events into.
pub type ChangeSender = mpsc::UnboundedSender<StorageItem>;

/// Handle for a live push subscription.
///
/// Dropping the handle releases the subscription.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a cancellation closure.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Release the subscription explicitly.
    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A remote replica, as consumed by the sync engine.
///
/// Concrete providers (REST, Postgres, object stores, ...) implement this
/// trait outside the engine; the engine never names one.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Items updated remotely after `since` (milliseconds since epoch).
    async fn list_changed_since(&self, since: Timestamp) -> Result<Vec<StorageItem>>;

    /// Read a single value, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value with its metadata.
    async fn put(&self, key: &str, value: Value, metadata: Metadata) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Subscribe to push events, when the backend supports them.
    ///
    /// The default declares no real-time capability.
    fn subscribe(&self, changes: ChangeSender) -> Option<Subscription> {
        let _ = changes;
        None
    }
}
