//! In-memory adapters for [`LocalStore`] and [`RemoteBackend`].
//!
//! Useful as fixtures in tests and as a starting point for embedded hosts
//! that persist elsewhere.

use crate::backend::{ChangeSender, RemoteBackend, Subscription};
use crate::error::Result;
use crate::item::{value_size, Metadata, StorageItem};
use crate::now_ms;
use crate::store::LocalStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tether_merge::{Timestamp, Value};
use tokio::sync::RwLock;

/// A `LocalStore` backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: RwLock<HashMap<String, (Value, Metadata)>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a value with an explicit update timestamp.
    pub async fn set_at(&self, key: &str, value: Value, timestamp: Timestamp) {
        let mut entries = self.entries.write().await;
        let size = value_size(&value);
        match entries.get_mut(key) {
            Some((stored, metadata)) => {
                *stored = value;
                metadata.touch(timestamp, size);
            }
            None => {
                let metadata = Metadata::new(key, size, timestamp);
                entries.insert(key.to_string(), (value, metadata));
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.set_at(key, value, now_ms()).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn metadata(&self, key: &str) -> Result<Option<Metadata>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .map(|(_, metadata)| metadata.clone()))
    }
}

/// A `RemoteBackend` backed by a hash map, with push-event support.
#[derive(Debug, Default)]
pub struct MemoryRemoteBackend {
    entries: RwLock<HashMap<String, StorageItem>>,
    subscribers: Arc<parking_lot::Mutex<Vec<(u64, ChangeSender)>>>,
    next_subscriber: AtomicU64,
}

impl MemoryRemoteBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the replica with an item at an explicit update timestamp.
    pub async fn seed(&self, key: &str, value: Value, updated_at: Timestamp) {
        let metadata = Metadata::for_value(key, &value, updated_at);
        let item = StorageItem::new(key, value, metadata);
        self.entries.write().await.insert(key.to_string(), item);
    }

    /// Store an item and push it to all live subscribers.
    pub async fn emit(&self, item: StorageItem) {
        self.entries
            .write()
            .await
            .insert(item.key.clone(), item.clone());
        self.subscribers
            .lock()
            .retain(|(_, sender)| sender.send(item.clone()).is_ok());
    }

    pub async fn item(&self, key: &str) -> Option<StorageItem> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[async_trait]
impl RemoteBackend for MemoryRemoteBackend {
    async fn list_changed_since(&self, since: Timestamp) -> Result<Vec<StorageItem>> {
        let mut items: Vec<StorageItem> = self
            .entries
            .read()
            .await
            .values()
            .filter(|item| item.metadata.updated_at > since)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .map(|item| item.value.clone()))
    }

    async fn put(&self, key: &str, value: Value, metadata: Metadata) -> Result<()> {
        // Server-stamp the write like a real backend would
        let mut metadata = metadata;
        metadata.updated_at = now_ms();
        let item = StorageItem::new(key, value, metadata);
        self.entries.write().await.insert(key.to_string(), item);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn subscribe(&self, changes: ChangeSender) -> Option<Subscription> {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().push((id, changes));

        let subscribers = self.subscribers.clone();
        Some(Subscription::new(move || {
            subscribers.lock().retain(|(sid, _)| *sid != id);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn local_store_tracks_metadata() {
        let store = MemoryLocalStore::new();
        store.set_at("k", Value::from(json!({"a": 1})), 1000).await;

        let meta = store.metadata("k").await.unwrap().unwrap();
        assert_eq!(meta.created_at, 1000);
        assert_eq!(meta.updated_at, 1000);

        store.set_at("k", Value::from(json!({"a": 2})), 2000).await;
        let meta = store.metadata("k").await.unwrap().unwrap();
        assert_eq!(meta.created_at, 1000);
        assert_eq!(meta.updated_at, 2000);
    }

    #[tokio::test]
    async fn local_store_get_set_delete() {
        let store = MemoryLocalStore::new();
        store.set("k", Value::from(1)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(Value::from(1)));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.metadata("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backend_change_feed_filters_by_timestamp() {
        let backend = MemoryRemoteBackend::new();
        backend.seed("old", Value::from(1), 100).await;
        backend.seed("new", Value::from(2), 500).await;

        let changed = backend.list_changed_since(200).await.unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].key, "new");
    }

    #[tokio::test]
    async fn backend_subscription_receives_and_cancels() {
        let backend = MemoryRemoteBackend::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subscription = backend.subscribe(tx).unwrap();
        assert_eq!(backend.subscriber_count(), 1);

        let item = StorageItem::new("k", Value::from(1), Metadata::new("k", 1, 100));
        backend.emit(item.clone()).await;
        assert_eq!(rx.recv().await.unwrap().key, "k");

        subscription.stop();
        assert_eq!(backend.subscriber_count(), 0);
    }
}
