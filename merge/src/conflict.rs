//! Conflict types, classification, and resolutions.

use crate::hash::stable_hash;
use crate::{Key, Timestamp, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of divergence detected between local and remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictType {
    /// Deleted on both sides
    DeleteDelete,
    /// Modified locally, deleted remotely
    ModifyDelete,
    /// Deleted locally, modified remotely
    DeleteModify,
    /// Created independently on both sides
    AddAdd,
    /// Modified on both sides
    ModifyModify,
    /// The two sides no longer hold the same kind of value
    TypeChange,
    /// Both sides hold the same sequence elements in a different order
    ArrayReorder,
}

/// A detected divergence between a local and a remote item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    /// The key both sides disagree about
    pub key: Key,
    /// Local value, if the item still exists locally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_value: Option<Value>,
    /// Remote value, if the item still exists remotely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_value: Option<Value>,
    /// Common ancestor, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_value: Option<Value>,
    /// When the local side was last updated (milliseconds since epoch)
    pub local_timestamp: Timestamp,
    /// When the remote side was last updated (milliseconds since epoch)
    pub remote_timestamp: Timestamp,
    /// When the ancestor was written, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_timestamp: Option<Timestamp>,
    /// Classification, filled in on resolution if absent
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub conflict_type: Option<ConflictType>,
}

impl SyncConflict {
    /// Create a conflict between a local and a remote side.
    pub fn new(
        key: impl Into<Key>,
        local_value: Option<Value>,
        remote_value: Option<Value>,
        local_timestamp: Timestamp,
        remote_timestamp: Timestamp,
    ) -> Self {
        Self {
            key: key.into(),
            local_value,
            remote_value,
            base_value: None,
            local_timestamp,
            remote_timestamp,
            base_timestamp: None,
            conflict_type: None,
        }
    }

    /// Attach the common ancestor.
    pub fn with_base(mut self, base_value: Value, base_timestamp: Timestamp) -> Self {
        self.base_value = Some(base_value);
        self.base_timestamp = Some(base_timestamp);
        self
    }

    /// Pin the classification instead of detecting it.
    pub fn with_type(mut self, conflict_type: ConflictType) -> Self {
        self.conflict_type = Some(conflict_type);
        self
    }

    /// Local value, with `null` treated as absent.
    pub(crate) fn local(&self) -> Option<&Value> {
        self.local_value.as_ref().filter(|v| !v.is_null())
    }

    /// Remote value, with `null` treated as absent.
    pub(crate) fn remote(&self) -> Option<&Value> {
        self.remote_value.as_ref().filter(|v| !v.is_null())
    }

    /// Base value, with `null` treated as absent.
    pub(crate) fn base(&self) -> Option<&Value> {
        self.base_value.as_ref().filter(|v| !v.is_null())
    }
}

/// Classify a conflict into one of the seven [`ConflictType`]s.
///
/// Existence means "present and non-null". When both sides exist the
/// refinement order is type change, then add/add (no ancestor), then array
/// reorder, then the plain modify/modify default.
pub fn detect_conflict_type(conflict: &SyncConflict) -> ConflictType {
    match (conflict.local(), conflict.remote()) {
        (None, None) => ConflictType::DeleteDelete,
        (Some(_), None) => ConflictType::ModifyDelete,
        (None, Some(_)) => ConflictType::DeleteModify,
        (Some(local), Some(remote)) => {
            if !local.same_kind(remote) {
                ConflictType::TypeChange
            } else if conflict.base().is_none() {
                ConflictType::AddAdd
            } else if is_reordered_sequence(local, remote) {
                ConflictType::ArrayReorder
            } else {
                ConflictType::ModifyModify
            }
        }
    }
}

/// Equal-length sequences with the same element multiset under the stable hash.
fn is_reordered_sequence(local: &Value, remote: &Value) -> bool {
    let (Some(a), Some(b)) = (local.as_array(), remote.as_array()) else {
        return false;
    };
    if a.len() != b.len() {
        return false;
    }

    let mut counts: HashMap<String, isize> = HashMap::new();
    for item in a {
        *counts.entry(stable_hash(item)).or_default() += 1;
    }
    for item in b {
        *counts.entry(stable_hash(item)).or_default() -= 1;
    }
    counts.values().all(|&n| n == 0)
}

/// What to do about a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionAction {
    /// Push the resolved value to the remote
    Upload,
    /// Write the resolved value to the local store
    Download,
    /// Apply the merged value to both sides
    Merge,
    /// Leave both sides untouched
    Skip,
    /// Remove the surviving copy
    Delete,
}

/// The outcome of resolving a conflict.
///
/// `value` is always present for `upload`, `download`, and `merge`; the
/// constructors enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub action: ResolutionAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConflictResolution {
    pub fn upload(value: Value) -> Self {
        Self {
            action: ResolutionAction::Upload,
            value: Some(value),
            reason: None,
        }
    }

    pub fn download(value: Value) -> Self {
        Self {
            action: ResolutionAction::Download,
            value: Some(value),
            reason: None,
        }
    }

    pub fn merge(value: Value) -> Self {
        Self {
            action: ResolutionAction::Merge,
            value: Some(value),
            reason: None,
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::Skip,
            value: None,
            reason: Some(reason.into()),
        }
    }

    pub fn delete() -> Self {
        Self {
            action: ResolutionAction::Delete,
            value: None,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conflict(local: Option<Value>, remote: Option<Value>, base: Option<Value>) -> SyncConflict {
        let mut c = SyncConflict::new("k", local, remote, 100, 100);
        if let Some(base) = base {
            c = c.with_base(base, 50);
        }
        c
    }

    #[test]
    fn classify_delete_delete() {
        let c = conflict(None, None, Some(Value::from(1)));
        assert_eq!(detect_conflict_type(&c), ConflictType::DeleteDelete);
    }

    #[test]
    fn classify_modify_delete() {
        let c = conflict(Some(Value::from(1)), None, Some(Value::from(0)));
        assert_eq!(detect_conflict_type(&c), ConflictType::ModifyDelete);

        // Without a base the surviving side still decides the class
        let c = conflict(Some(Value::from(1)), None, None);
        assert_eq!(detect_conflict_type(&c), ConflictType::ModifyDelete);
    }

    #[test]
    fn classify_delete_modify() {
        let c = conflict(None, Some(Value::from(2)), Some(Value::from(0)));
        assert_eq!(detect_conflict_type(&c), ConflictType::DeleteModify);
    }

    #[test]
    fn classify_add_add() {
        let c = conflict(Some(Value::from(1)), Some(Value::from(2)), None);
        assert_eq!(detect_conflict_type(&c), ConflictType::AddAdd);
    }

    #[test]
    fn classify_modify_modify() {
        let c = conflict(
            Some(Value::from(1)),
            Some(Value::from(2)),
            Some(Value::from(0)),
        );
        assert_eq!(detect_conflict_type(&c), ConflictType::ModifyModify);
    }

    #[test]
    fn type_change_overrides() {
        let c = conflict(
            Some(Value::from(1)),
            Some(Value::from("one")),
            Some(Value::from(0)),
        );
        assert_eq!(detect_conflict_type(&c), ConflictType::TypeChange);

        // Array-ness differing is a type change too
        let c = conflict(
            Some(Value::from(json!([1]))),
            Some(Value::from(json!({"a": 1}))),
            Some(Value::from(json!([1]))),
        );
        assert_eq!(detect_conflict_type(&c), ConflictType::TypeChange);
    }

    #[test]
    fn array_reorder_detected() {
        let c = conflict(
            Some(Value::from(json!([1, 2, 3]))),
            Some(Value::from(json!([3, 1, 2]))),
            Some(Value::from(json!([1, 2, 3]))),
        );
        assert_eq!(detect_conflict_type(&c), ConflictType::ArrayReorder);
    }

    #[test]
    fn unequal_multisets_are_not_reorders() {
        let c = conflict(
            Some(Value::from(json!([1, 1, 2]))),
            Some(Value::from(json!([1, 2, 2]))),
            Some(Value::from(json!([1, 2]))),
        );
        assert_eq!(detect_conflict_type(&c), ConflictType::ModifyModify);
    }

    #[test]
    fn null_counts_as_absent() {
        let c = conflict(Some(Value::Null), Some(Value::from(1)), None);
        assert_eq!(detect_conflict_type(&c), ConflictType::DeleteModify);
    }

    #[test]
    fn pinned_type_survives_serialization() {
        let c = conflict(Some(Value::from(1)), Some(Value::from(2)), None)
            .with_type(ConflictType::ModifyModify);
        let text = serde_json::to_string(&c).unwrap();
        assert!(text.contains("\"type\":\"modifyModify\""));
        let parsed: SyncConflict = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.conflict_type, Some(ConflictType::ModifyModify));
    }

    #[test]
    fn resolution_constructors_carry_values() {
        assert_eq!(
            ConflictResolution::upload(Value::from(1)).value,
            Some(Value::from(1))
        );
        assert_eq!(ConflictResolution::skip("why").value, None);
        assert_eq!(
            ConflictResolution::delete().action,
            ResolutionAction::Delete
        );
    }
}
