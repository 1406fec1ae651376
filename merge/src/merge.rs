//! Two- and three-way structural merging.
//!
//! Merges recurse over mappings key-wise and reconcile sequences by
//! strategy. Per-field rules are consulted at each dotted path before
//! structural recursion; in three-way merges they fire only once both sides
//! have diverged from the base (unchanged sides short-circuit first).

use crate::error::{Error, Result};
use crate::hash::stable_hash;
use crate::strategy::{CustomMergeFn, FieldRule, MergeStrategy};
use crate::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Structural merger over a resolver's configuration.
pub(crate) struct Merger<'a> {
    strategy: MergeStrategy,
    prefer_local: bool,
    rules: &'a [FieldRule],
    registered: &'a HashMap<String, CustomMergeFn>,
}

impl<'a> Merger<'a> {
    pub(crate) fn new(
        strategy: MergeStrategy,
        prefer_local: bool,
        rules: &'a [FieldRule],
        registered: &'a HashMap<String, CustomMergeFn>,
    ) -> Self {
        Self {
            strategy,
            prefer_local,
            rules,
            registered,
        }
    }

    /// Merge two divergent values without a common ancestor.
    pub(crate) fn two_way(&self, local: &Value, remote: &Value) -> Result<Value> {
        self.merge_two_at(local, remote, "")
    }

    /// Merge two divergent values using their common ancestor.
    pub(crate) fn three_way(&self, local: &Value, remote: &Value, base: &Value) -> Result<Value> {
        self.merge_three_at(local, remote, base, "")
    }

    fn rule_for(&self, path: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    fn merge_two_at(&self, local: &Value, remote: &Value, path: &str) -> Result<Value> {
        match (local, remote) {
            (Value::Object(lo), Value::Object(ro)) => {
                let keys: BTreeSet<&String> = lo.keys().chain(ro.keys()).collect();
                let mut out = BTreeMap::new();
                for key in keys {
                    let path = child_path(path, key);
                    if let Some(merged) = self.merge_field_two(&path, lo.get(key), ro.get(key))? {
                        out.insert(key.clone(), merged);
                    }
                }
                Ok(Value::Object(out))
            }
            (Value::Array(la), Value::Array(ra)) => {
                Ok(self.merge_sequences(la, ra, self.strategy))
            }
            _ if local.same_kind(remote) => Ok(self.pick_primitive(local, remote)),
            // Kind mismatch mid-structure
            _ => Ok(if self.prefer_local {
                local.clone()
            } else {
                remote.clone()
            }),
        }
    }

    fn merge_field_two(
        &self,
        path: &str,
        local: Option<&Value>,
        remote: Option<&Value>,
    ) -> Result<Option<Value>> {
        if let Some(rule) = self.rule_for(path) {
            return self.apply_rule(rule, local, remote, None, path);
        }
        match (local, remote) {
            (Some(lv), Some(rv)) => self.merge_two_at(lv, rv, path).map(Some),
            (Some(lv), None) => Ok(Some(lv.clone())),
            (None, Some(rv)) => Ok(Some(rv.clone())),
            (None, None) => Ok(None),
        }
    }

    fn merge_three_at(
        &self,
        local: &Value,
        remote: &Value,
        base: &Value,
        path: &str,
    ) -> Result<Value> {
        if local == base {
            // Only remote changed (or nothing did)
            return Ok(remote.clone());
        }
        if remote == base {
            // Only local changed
            return Ok(local.clone());
        }

        match (local, remote, base) {
            (Value::Object(lo), Value::Object(ro), Value::Object(bo)) => {
                let keys: BTreeSet<&String> =
                    lo.keys().chain(ro.keys()).chain(bo.keys()).collect();
                let mut out = BTreeMap::new();
                for key in keys {
                    let path = child_path(path, key);
                    if let Some(merged) =
                        self.merge_field_three(&path, lo.get(key), ro.get(key), bo.get(key))?
                    {
                        out.insert(key.clone(), merged);
                    }
                }
                Ok(Value::Object(out))
            }
            (Value::Array(la), Value::Array(ra), Value::Array(ba)) => {
                Ok(self.merge_sequences_three(la, ra, ba))
            }
            _ => match self.strategy {
                MergeStrategy::RemoteWins => Ok(remote.clone()),
                MergeStrategy::LocalWins | MergeStrategy::LastWriteWins => Ok(local.clone()),
                _ => self.merge_two_at(local, remote, path),
            },
        }
    }

    fn merge_field_three(
        &self,
        path: &str,
        local: Option<&Value>,
        remote: Option<&Value>,
        base: Option<&Value>,
    ) -> Result<Option<Value>> {
        let local_changed = local != base;
        let remote_changed = remote != base;
        if !local_changed && !remote_changed {
            return Ok(base.cloned());
        }
        if !remote_changed {
            return Ok(local.cloned());
        }
        if !local_changed {
            return Ok(remote.cloned());
        }

        // Concurrent edits at this key
        if let Some(rule) = self.rule_for(path) {
            return self.apply_rule(rule, local, remote, base, path);
        }
        match (local, remote, base) {
            (
                Some(lv @ Value::Object(_)),
                Some(rv @ Value::Object(_)),
                Some(bv @ Value::Object(_)),
            ) => self.merge_three_at(lv, rv, bv, path).map(Some),
            (Some(Value::Array(la)), Some(Value::Array(ra)), Some(Value::Array(ba))) => {
                Ok(Some(self.merge_sequences_three(la, ra, ba)))
            }
            _ => self.resolve_concurrent(local, remote, path),
        }
    }

    /// Concurrent edits with no structural recursion left: fall back to the
    /// default strategy, with local winning for non-directional strategies.
    fn resolve_concurrent(
        &self,
        local: Option<&Value>,
        remote: Option<&Value>,
        path: &str,
    ) -> Result<Option<Value>> {
        match self.strategy {
            MergeStrategy::RemoteWins => Ok(remote.cloned()),
            MergeStrategy::LocalWins | MergeStrategy::LastWriteWins => Ok(local.cloned()),
            _ => match (local, remote) {
                (Some(lv), Some(rv)) => self.merge_two_at(lv, rv, path).map(Some),
                (Some(lv), None) => Ok(Some(lv.clone())),
                (None, Some(rv)) => Ok(Some(rv.clone())),
                (None, None) => Ok(None),
            },
        }
    }

    fn pick_primitive(&self, local: &Value, remote: &Value) -> Value {
        match self.strategy {
            MergeStrategy::RemoteWins => remote.clone(),
            // All other strategies fall back to the local side on primitives
            _ => local.clone(),
        }
    }

    fn merge_sequences(&self, local: &[Value], remote: &[Value], strategy: MergeStrategy) -> Value {
        match strategy {
            MergeStrategy::LocalWins => Value::Array(local.to_vec()),
            MergeStrategy::RemoteWins => Value::Array(remote.to_vec()),
            MergeStrategy::ArrayConcat => {
                let mut out = local.to_vec();
                out.extend(remote.iter().cloned());
                Value::Array(out)
            }
            MergeStrategy::KeepBoth => Value::Array(vec![
                Value::Array(local.to_vec()),
                Value::Array(remote.to_vec()),
            ]),
            // Union is the default sequence behavior
            _ => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for item in local.iter().chain(remote.iter()) {
                    if seen.insert(stable_hash(item)) {
                        out.push(item.clone());
                    }
                }
                Value::Array(out)
            }
        }
    }

    /// Three-way sequence merge: local ordering is authoritative for shared
    /// items, single-side deletions are honored, remote additions append.
    fn merge_sequences_three(&self, local: &[Value], remote: &[Value], base: &[Value]) -> Value {
        let base_hashes: HashSet<String> = base.iter().map(stable_hash).collect();
        let remote_hashes: HashSet<String> = remote.iter().map(stable_hash).collect();

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for item in local {
            let hash = stable_hash(item);
            let locally_added = !base_hashes.contains(&hash);
            let kept_by_remote = remote_hashes.contains(&hash);
            if (locally_added || kept_by_remote) && seen.insert(hash) {
                out.push(item.clone());
            }
        }
        for item in remote {
            let hash = stable_hash(item);
            if !base_hashes.contains(&hash) && seen.insert(hash) {
                out.push(item.clone());
            }
        }
        Value::Array(out)
    }

    fn apply_rule(
        &self,
        rule: &FieldRule,
        local: Option<&Value>,
        remote: Option<&Value>,
        base: Option<&Value>,
        path: &str,
    ) -> Result<Option<Value>> {
        match rule.strategy {
            MergeStrategy::LocalWins => Ok(local.cloned()),
            MergeStrategy::RemoteWins => Ok(remote.cloned()),
            MergeStrategy::LastWriteWins => Ok(local.cloned().or_else(|| remote.cloned())),
            MergeStrategy::MaxValue => Ok(Some(Value::Number(num(local).max(num(remote))))),
            MergeStrategy::MinValue => Ok(Some(Value::Number(num(local).min(num(remote))))),
            MergeStrategy::CounterIncrement => {
                let origin = num(base);
                let merged = origin + (num(local) - origin) + (num(remote) - origin);
                Ok(Some(Value::Number(merged)))
            }
            MergeStrategy::KeepBoth => {
                let mut out = Vec::new();
                if let Some(lv) = local {
                    out.push(lv.clone());
                }
                if let Some(rv) = remote {
                    out.push(rv.clone());
                }
                Ok(Some(Value::Array(out)))
            }
            MergeStrategy::ArrayUnion | MergeStrategy::ArrayConcat => {
                let la = elements(local);
                let ra = elements(remote);
                Ok(Some(self.merge_sequences(&la, &ra, rule.strategy)))
            }
            MergeStrategy::DeepMerge => match (local, remote) {
                (Some(lv @ Value::Object(_)), Some(rv @ Value::Object(_))) => {
                    if let Some(bv @ Value::Object(_)) = base {
                        self.merge_three_at(lv, rv, bv, path).map(Some)
                    } else {
                        self.merge_two_at(lv, rv, path).map(Some)
                    }
                }
                _ => Ok(local.cloned().or_else(|| remote.cloned())),
            },
            MergeStrategy::Custom => {
                let resolver = rule
                    .resolver
                    .clone()
                    .or_else(|| self.registered.get(path).cloned())
                    .or_else(|| self.registered.get(&rule.field).cloned())
                    .ok_or_else(|| Error::MissingCustomResolver(path.to_string()))?;
                let null = Value::Null;
                resolver(local.unwrap_or(&null), remote.unwrap_or(&null), base).map(Some)
            }
        }
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Operand as a number, with absent or non-numeric values counting as 0.
fn num(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

/// Sequence elements of an operand; scalars become singletons.
fn elements(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    }
}
