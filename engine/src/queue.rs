//! Bounded offline queue of pending mutations.
//!
//! Mutations made while disconnected are queued in FIFO order and drained
//! at the start of the next reconciliation pass. The queue is bounded: on
//! overflow the oldest entry is dropped.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tether_merge::{Key, Timestamp, Value};
use uuid::Uuid;

/// The pending mutation itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueueOp {
    Set { value: Value },
    Delete,
}

/// One queued mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    #[serde(flatten)]
    pub op: QueueOp,
    pub key: Key,
    /// When the mutation was made (milliseconds since epoch)
    pub timestamp: Timestamp,
    /// Drain attempts so far
    pub retry_count: u32,
}

impl QueueItem {
    pub fn set(key: impl Into<Key>, value: Value, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op: QueueOp::Set { value },
            key: key.into(),
            timestamp,
            retry_count: 0,
        }
    }

    pub fn delete(key: impl Into<Key>, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op: QueueOp::Delete,
            key: key.into(),
            timestamp,
            retry_count: 0,
        }
    }
}

/// Bounded FIFO of pending mutations.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    items: VecDeque<QueueItem>,
    max_size: usize,
}

impl OfflineQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Append a mutation. Returns the evicted head when the bound was hit.
    pub fn enqueue(&mut self, item: QueueItem) -> Option<QueueItem> {
        let evicted = if self.items.len() >= self.max_size {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Take a snapshot of all pending mutations, clearing the queue.
    pub fn take_all(&mut self) -> Vec<QueueItem> {
        self.items.drain(..).collect()
    }

    /// Put a failed mutation back at the tail.
    pub fn restore(&mut self, item: QueueItem) -> Option<QueueItem> {
        self.enqueue(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Encode the queue for persistence.
    pub fn to_value(&self) -> Result<Value> {
        let items: Vec<&QueueItem> = self.items.iter().collect();
        Ok(Value::from(serde_json::to_value(items)?))
    }

    /// Decode a persisted queue, keeping at most `max_size` newest entries.
    pub fn from_value(value: &Value, max_size: usize) -> Result<Self> {
        let json: serde_json::Value = value.clone().into();
        let items: Vec<QueueItem> = serde_json::from_value(json)?;

        let mut queue = Self::new(max_size);
        for item in items {
            queue.enqueue(item);
        }
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enqueue_preserves_fifo_order() {
        let mut queue = OfflineQueue::new(10);
        queue.enqueue(QueueItem::set("a", Value::from(1), 100));
        queue.enqueue(QueueItem::delete("b", 200));

        let drained = queue.take_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].key, "a");
        assert_eq!(drained[1].key, "b");
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut queue = OfflineQueue::new(2);
        queue.enqueue(QueueItem::set("a", Value::from(1), 100));
        queue.enqueue(QueueItem::set("b", Value::from(2), 200));
        let evicted = queue.enqueue(QueueItem::set("c", Value::from(3), 300));

        assert_eq!(evicted.map(|item| item.key), Some("a".to_string()));
        let keys: Vec<&str> = queue.items().map(|item| item.key.as_str()).collect();
        assert_eq!(keys, ["b", "c"]);
    }

    #[test]
    fn bound_holds_under_restore() {
        let mut queue = OfflineQueue::new(1);
        queue.enqueue(QueueItem::set("a", Value::from(1), 100));
        queue.restore(QueueItem::set("b", Value::from(2), 200));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.items().next().map(|i| i.key.as_str()), Some("b"));
    }

    #[test]
    fn persistence_roundtrip() {
        let mut queue = OfflineQueue::new(10);
        queue.enqueue(QueueItem::set("a", Value::from(json!({"n": 1})), 100));
        queue.enqueue(QueueItem::delete("b", 200));

        let value = queue.to_value().unwrap();
        let restored = OfflineQueue::from_value(&value, 10).unwrap();

        let original: Vec<QueueItem> = queue.items().cloned().collect();
        let loaded: Vec<QueueItem> = restored.items().cloned().collect();
        assert_eq!(original, loaded);
    }

    #[test]
    fn serialized_form_is_tagged() {
        let item = QueueItem::set("a", Value::from(1), 100);
        let text = serde_json::to_string(&item).unwrap();
        assert!(text.contains("\"type\":\"set\""));
        assert!(text.contains("\"retryCount\":0"));

        let item = QueueItem::delete("b", 200);
        let text = serde_json::to_string(&item).unwrap();
        assert!(text.contains("\"type\":\"delete\""));
    }

    #[test]
    fn loading_truncates_to_bound() {
        let mut queue = OfflineQueue::new(10);
        for i in 0..5 {
            queue.enqueue(QueueItem::set(format!("k{}", i), Value::from(i as i64), 100));
        }
        let value = queue.to_value().unwrap();

        let restored = OfflineQueue::from_value(&value, 2).unwrap();
        assert_eq!(restored.len(), 2);
        let keys: Vec<&str> = restored.items().map(|item| item.key.as_str()).collect();
        assert_eq!(keys, ["k3", "k4"]);
    }
}
