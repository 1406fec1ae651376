//! The conflict resolver: classification, routing, and history.

use crate::conflict::{
    detect_conflict_type, ConflictResolution, ConflictType, SyncConflict,
};
use crate::error::Result;
use crate::history::{ConflictHistory, ConflictHistoryEntry};
use crate::merge::Merger;
use crate::strategy::{CustomMergeFn, FieldRule, MergeStrategy};
use crate::Value;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Callback consulted when a merge fails; returning `None` falls back to skip.
pub type UnresolvableHook = Box<dyn Fn(&SyncConflict) -> Option<ConflictResolution> + Send + Sync>;

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Strategy applied when no field rule matches
    pub default_strategy: MergeStrategy,
    /// Per-field overrides, first match wins
    pub field_strategies: Vec<FieldRule>,
    /// Bias when the two sides no longer agree on a value's kind
    pub prefer_local_on_type_conflict: bool,
    /// Use the common ancestor when one is available
    pub enable_three_way_merge: bool,
    /// Record every resolution
    pub track_history: bool,
    /// History capacity, oldest entries dropped first
    pub max_history_entries: usize,
    /// Emit a debug log line per resolution
    pub logging: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_strategy: MergeStrategy::LastWriteWins,
            field_strategies: Vec::new(),
            prefer_local_on_type_conflict: true,
            enable_three_way_merge: true,
            track_history: false,
            max_history_entries: 1000,
            logging: false,
        }
    }
}

/// Classifies conflicts and produces resolutions.
pub struct ConflictResolver {
    config: ResolverConfig,
    registered: HashMap<String, CustomMergeFn>,
    history: ConflictHistory,
    on_unresolvable: Option<UnresolvableHook>,
}

impl ConflictResolver {
    /// Create a resolver with the given configuration.
    pub fn new(config: ResolverConfig) -> Self {
        let history = ConflictHistory::new(config.max_history_entries);
        Self {
            config,
            registered: HashMap::new(),
            history,
            on_unresolvable: None,
        }
    }

    /// Install the unresolvable-conflict hook.
    pub fn with_unresolvable_hook(mut self, hook: UnresolvableHook) -> Self {
        self.on_unresolvable = Some(hook);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Register a custom merge function for a field path.
    pub fn register_field_resolver(
        &mut self,
        field: impl Into<String>,
        resolver: impl Fn(&Value, &Value, Option<&Value>) -> Result<Value> + Send + Sync + 'static,
    ) {
        self.registered
            .insert(field.into(), std::sync::Arc::new(resolver));
    }

    /// Remove a previously registered custom merge function.
    pub fn unregister_field_resolver(&mut self, field: &str) {
        self.registered.remove(field);
    }

    /// Resolve a single conflict.
    pub fn resolve(&mut self, conflict: &SyncConflict) -> ConflictResolution {
        let conflict_type = conflict
            .conflict_type
            .unwrap_or_else(|| detect_conflict_type(conflict));
        let resolution = self.route(conflict, conflict_type);

        if self.config.logging {
            tracing::debug!(
                key = %conflict.key,
                ?conflict_type,
                action = ?resolution.action,
                "conflict resolved"
            );
        }
        if self.config.track_history {
            self.history.record(ConflictHistoryEntry {
                timestamp: now_ms(),
                key: conflict.key.clone(),
                conflict_type,
                resolution: resolution.clone(),
                automatic: true,
            });
        }
        resolution
    }

    /// Resolve conflicts in order, one resolution per conflict.
    pub fn resolve_all(&mut self, conflicts: &[SyncConflict]) -> Vec<ConflictResolution> {
        conflicts.iter().map(|c| self.resolve(c)).collect()
    }

    /// Merge two values using the common ancestor.
    pub fn three_way_merge(&self, local: &Value, remote: &Value, base: &Value) -> Result<Value> {
        self.merger().three_way(local, remote, base)
    }

    /// Merge two values without an ancestor.
    pub fn two_way_merge(&self, local: &Value, remote: &Value) -> Result<Value> {
        self.merger().two_way(local, remote)
    }

    /// The most recent history entries, oldest first. `None` returns all.
    pub fn history(&self, limit: Option<usize>) -> Vec<ConflictHistoryEntry> {
        self.history.recent(limit)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn merger(&self) -> Merger<'_> {
        Merger::new(
            self.config.default_strategy,
            self.config.prefer_local_on_type_conflict,
            &self.config.field_strategies,
            &self.registered,
        )
    }

    fn route(&self, conflict: &SyncConflict, conflict_type: ConflictType) -> ConflictResolution {
        let prefer_local = self.config.prefer_local_on_type_conflict;
        match conflict_type {
            ConflictType::DeleteDelete => ConflictResolution::skip("deleted on both sides"),
            ConflictType::ModifyDelete => match (prefer_local, conflict.local()) {
                (true, Some(local)) => ConflictResolution::upload(local.clone()),
                (true, None) => ConflictResolution::skip("local value missing"),
                (false, _) => ConflictResolution::delete(),
            },
            ConflictType::DeleteModify => match (prefer_local, conflict.remote()) {
                (true, _) => ConflictResolution::delete(),
                (false, Some(remote)) => ConflictResolution::download(remote.clone()),
                (false, None) => ConflictResolution::skip("remote value missing"),
            },
            ConflictType::TypeChange => match (conflict.local(), conflict.remote()) {
                (Some(local), _) if prefer_local => ConflictResolution::upload(local.clone()),
                (_, Some(remote)) if !prefer_local => {
                    ConflictResolution::download(remote.clone())
                }
                _ => ConflictResolution::skip("conflicting side missing"),
            },
            ConflictType::ModifyModify | ConflictType::AddAdd | ConflictType::ArrayReorder => {
                self.merge_conflict(conflict)
            }
        }
    }

    fn merge_conflict(&self, conflict: &SyncConflict) -> ConflictResolution {
        let (Some(local), Some(remote)) = (conflict.local(), conflict.remote()) else {
            return ConflictResolution::skip("both sides required for merge");
        };

        match self.try_merge(conflict, local, remote) {
            Ok(resolution) => resolution,
            Err(err) => {
                if let Some(hook) = &self.on_unresolvable {
                    if let Some(resolution) = hook(conflict) {
                        return resolution;
                    }
                }
                ConflictResolution::skip(err.to_string())
            }
        }
    }

    fn try_merge(
        &self,
        conflict: &SyncConflict,
        local: &Value,
        remote: &Value,
    ) -> Result<ConflictResolution> {
        if self.config.enable_three_way_merge {
            if let Some(base) = conflict.base() {
                let merged = self.merger().three_way(local, remote, base)?;
                return Ok(ConflictResolution::merge(merged));
            }
        }
        match self.config.default_strategy {
            MergeStrategy::LocalWins => Ok(ConflictResolution::upload(local.clone())),
            MergeStrategy::RemoteWins => Ok(ConflictResolution::download(remote.clone())),
            MergeStrategy::LastWriteWins => {
                // Ties favor local
                if conflict.local_timestamp >= conflict.remote_timestamp {
                    Ok(ConflictResolution::upload(local.clone()))
                } else {
                    Ok(ConflictResolution::download(remote.clone()))
                }
            }
            _ => {
                let merged = self.merger().two_way(local, remote)?;
                Ok(ConflictResolution::merge(merged))
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
