//! Property and scenario tests for the merge core.
//!
//! These cover the laws the resolver must uphold for arbitrary values, plus
//! the concrete divergence scenarios unit tests tend to miss.

use proptest::prelude::*;
use serde_json::json;
use tether_merge::{
    detect_conflict_type, stable_hash, ConflictResolver, ConflictType, FieldRule, MergeStrategy,
    ResolutionAction, ResolverConfig, SyncConflict, Value,
};

fn v(json: serde_json::Value) -> Value {
    Value::from(json)
}

fn resolver_with(config: ResolverConfig) -> ConflictResolver {
    ConflictResolver::new(config)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn last_write_wins_tie_favors_local() {
    let mut resolver = resolver_with(ResolverConfig::default());
    let conflict = SyncConflict::new("k", Some(v(json!("L"))), Some(v(json!("R"))), 100, 100);

    let resolution = resolver.resolve(&conflict);
    assert_eq!(resolution.action, ResolutionAction::Upload);
    assert_eq!(resolution.value, Some(v(json!("L"))));
}

#[test]
fn three_way_merge_preserves_remote_additions() {
    let resolver = resolver_with(ResolverConfig::default());

    let merged = resolver
        .three_way_merge(
            &v(json!({"a": 1, "b": 2})),
            &v(json!({"a": 1, "c": 3})),
            &v(json!({"a": 1})),
        )
        .unwrap();
    assert_eq!(merged, v(json!({"a": 1, "b": 2, "c": 3})));
}

#[test]
fn counter_merge_adds_both_deltas() {
    let resolver = resolver_with(ResolverConfig {
        field_strategies: vec![FieldRule::new("count", MergeStrategy::CounterIncrement)],
        ..ResolverConfig::default()
    });

    let merged = resolver
        .three_way_merge(
            &v(json!({"count": 12})),
            &v(json!({"count": 15})),
            &v(json!({"count": 10})),
        )
        .unwrap();
    assert_eq!(merged, v(json!({"count": 17})));
}

#[test]
fn array_union_dedups_by_structural_hash() {
    let resolver = resolver_with(ResolverConfig::default());

    let merged = resolver
        .two_way_merge(
            &v(json!([{"id": 1}, {"id": 2}])),
            &v(json!([{"id": 2}, {"id": 3}])),
        )
        .unwrap();
    assert_eq!(merged, v(json!([{"id": 1}, {"id": 2}, {"id": 3}])));
}

#[test]
fn modify_delete_with_prefer_local_uploads() {
    let mut resolver = resolver_with(ResolverConfig::default());
    let conflict = SyncConflict::new("k", Some(v(json!({"v": 1}))), None, 100, 100)
        .with_base(v(json!({"v": 0})), 50);

    let resolution = resolver.resolve(&conflict);
    assert_eq!(resolution.action, ResolutionAction::Upload);
    assert_eq!(resolution.value, Some(v(json!({"v": 1}))));
}

// ============================================================================
// Property tests
// ============================================================================

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(|n| Value::Number(n as f64)),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::Object),
        ]
    })
}

fn sorted_hashes(value: &Value) -> Vec<String> {
    let mut hashes: Vec<String> = value
        .as_array()
        .map(|items| items.iter().map(stable_hash).collect())
        .unwrap_or_default();
    hashes.sort();
    hashes
}

proptest! {
    #[test]
    fn three_way_merge_identity(value in arb_value()) {
        let resolver = resolver_with(ResolverConfig::default());
        let merged = resolver.three_way_merge(&value, &value, &value).unwrap();
        prop_assert_eq!(merged, value);
    }

    #[test]
    fn hash_agrees_with_equality(a in arb_value(), b in arb_value()) {
        let hashes_equal = stable_hash(&a) == stable_hash(&b);
        prop_assert_eq!(hashes_equal, a == b);
    }

    #[test]
    fn array_union_commutes_as_multiset(
        a in prop::collection::vec(arb_value(), 0..6),
        b in prop::collection::vec(arb_value(), 0..6),
    ) {
        let resolver = resolver_with(ResolverConfig {
            default_strategy: MergeStrategy::ArrayUnion,
            ..ResolverConfig::default()
        });

        let ab = resolver
            .two_way_merge(&Value::Array(a.clone()), &Value::Array(b.clone()))
            .unwrap();
        let ba = resolver
            .two_way_merge(&Value::Array(b), &Value::Array(a))
            .unwrap();

        prop_assert_eq!(sorted_hashes(&ab), sorted_hashes(&ba));
    }

    #[test]
    fn counter_law(base in -1000i64..1000, x in -100i64..100, y in -100i64..100) {
        let resolver = resolver_with(ResolverConfig {
            field_strategies: vec![FieldRule::new("n", MergeStrategy::CounterIncrement)],
            ..ResolverConfig::default()
        });

        let merged = resolver
            .three_way_merge(
                &v(json!({"n": base + x})),
                &v(json!({"n": base + y})),
                &v(json!({"n": base})),
            )
            .unwrap();
        prop_assert_eq!(
            merged.get("n").and_then(Value::as_f64),
            Some((base + x + y) as f64)
        );
    }

    #[test]
    fn classification_is_total(
        local in prop::option::of(arb_value()),
        remote in prop::option::of(arb_value()),
        base in prop::option::of(arb_value()),
    ) {
        let mut conflict = SyncConflict::new("k", local, remote, 100, 200);
        if let Some(base) = base {
            conflict = conflict.with_base(base, 50);
        }

        let detected = detect_conflict_type(&conflict);
        prop_assert!(matches!(
            detected,
            ConflictType::DeleteDelete
                | ConflictType::ModifyDelete
                | ConflictType::DeleteModify
                | ConflictType::AddAdd
                | ConflictType::ModifyModify
                | ConflictType::TypeChange
                | ConflictType::ArrayReorder
        ));
    }

    #[test]
    fn resolution_value_present_for_directional_actions(
        local in prop::option::of(arb_value()),
        remote in prop::option::of(arb_value()),
        local_ts in 0u64..10_000,
        remote_ts in 0u64..10_000,
    ) {
        let mut resolver = resolver_with(ResolverConfig::default());
        let conflict = SyncConflict::new("k", local, remote, local_ts, remote_ts);

        let resolution = resolver.resolve(&conflict);
        match resolution.action {
            ResolutionAction::Upload
            | ResolutionAction::Download
            | ResolutionAction::Merge => prop_assert!(resolution.value.is_some()),
            ResolutionAction::Skip | ResolutionAction::Delete => {}
        }
    }
}
