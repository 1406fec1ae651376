//! Merge strategies and per-field rules.

use crate::error::Result;
use crate::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How divergent values are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeStrategy {
    /// Take the local side
    LocalWins,
    /// Take the remote side
    RemoteWins,
    /// Later timestamp wins, ties favor local (default)
    #[default]
    LastWriteWins,
    /// Merge mappings key-wise, sequences by union
    DeepMerge,
    /// Deduplicate sequence elements by structural hash, local order first
    ArrayUnion,
    /// Local elements followed by remote elements
    ArrayConcat,
    /// Keep both sides as a two-element sequence
    KeepBoth,
    /// Numeric maximum, absent operands counting as 0
    MaxValue,
    /// Numeric minimum, absent operands counting as 0
    MinValue,
    /// Add both sides' deltas relative to the base
    CounterIncrement,
    /// Delegate to a registered resolver function
    Custom,
}

/// A custom merge function: `(local, remote, base) -> merged`.
///
/// Absent sides are passed as [`Value::Null`].
pub type CustomMergeFn = Arc<dyn Fn(&Value, &Value, Option<&Value>) -> Result<Value> + Send + Sync>;

/// A per-field override applied before structural recursion.
///
/// The `field` is either an exact dotted path (`"stats.count"`) or a prefix
/// pattern (`"stats.*"`) matching every path below the prefix.
#[derive(Clone)]
pub struct FieldRule {
    pub field: String,
    pub strategy: MergeStrategy,
    pub resolver: Option<CustomMergeFn>,
}

impl FieldRule {
    /// Create a rule applying `strategy` at `field`.
    pub fn new(field: impl Into<String>, strategy: MergeStrategy) -> Self {
        Self {
            field: field.into(),
            strategy,
            resolver: None,
        }
    }

    /// Create a rule delegating to a custom merge function.
    pub fn custom(
        field: impl Into<String>,
        resolver: impl Fn(&Value, &Value, Option<&Value>) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            field: field.into(),
            strategy: MergeStrategy::Custom,
            resolver: Some(Arc::new(resolver)),
        }
    }

    /// Whether this rule applies at the given dotted path.
    pub fn matches(&self, path: &str) -> bool {
        match self.field.strip_suffix(".*") {
            Some(prefix) => path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.')),
            None => self.field == path,
        }
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("field", &self.field)
            .field("strategy", &self.strategy)
            .field("resolver", &self.resolver.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        let rule = FieldRule::new("stats.count", MergeStrategy::CounterIncrement);
        assert!(rule.matches("stats.count"));
        assert!(!rule.matches("stats"));
        assert!(!rule.matches("stats.count.nested"));
        assert!(!rule.matches("stats.counters"));
    }

    #[test]
    fn prefix_pattern_matches_subpaths_only() {
        let rule = FieldRule::new("stats.*", MergeStrategy::MaxValue);
        assert!(rule.matches("stats.count"));
        assert!(rule.matches("stats.nested.deep"));
        assert!(!rule.matches("stats"));
        assert!(!rule.matches("statistics.count"));
    }

    #[test]
    fn serde_names_are_camel_case() {
        let text = serde_json::to_string(&MergeStrategy::CounterIncrement).unwrap();
        assert_eq!(text, "\"counterIncrement\"");
        let parsed: MergeStrategy = serde_json::from_str("\"lastWriteWins\"").unwrap();
        assert_eq!(parsed, MergeStrategy::LastWriteWins);
    }

    #[test]
    fn custom_rule_carries_resolver() {
        let rule = FieldRule::custom("notes", |local, _, _| Ok(local.clone()));
        assert_eq!(rule.strategy, MergeStrategy::Custom);
        assert!(rule.resolver.is_some());
    }
}
