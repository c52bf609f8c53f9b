//! Property-Based Tests for Cache Views
//!
//! # Test Properties
//!
//! 1. **Table Model**: any put/remove log leaves the same contents as a `HashMap`
//! 2. **Sentinel Safety**: the current free marker is a storable key
//! 3. **No Tombstones**: misses terminate and probe no further than a fresh table
//! 4. **Bulk Removal**: `remove_if` removes exactly the matching keys
//! 5. **Composite Aggregation**: sums and extremes over any partitioning match the whole

#![cfg(test)]

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{CacheView, CacheViewExt, CompositeCacheView, DefaultCacheView, LongEntityMap};

// =============================================================================
// Property Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Put(u64, u32),
    Remove(u64),
}

/// Keys drawn from a narrow range so puts and removes collide often
fn narrow_key() -> BoxedStrategy<u64> {
    (0u64..64).boxed()
}

/// Keys drawn from the whole range, including the extremes
fn wide_key() -> BoxedStrategy<u64> {
    prop_oneof![
        any::<u64>(),
        Just(0u64),
        Just(u64::MAX),
        (0u64..1_000_000).prop_map(|t| t << 22),
    ]
    .boxed()
}

fn op_strategy(key: BoxedStrategy<u64>) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (key.clone(), any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        2 => key.prop_map(Op::Remove),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop_oneof![
        prop::collection::vec(op_strategy(narrow_key()), 0..400),
        prop::collection::vec(op_strategy(wide_key()), 0..400),
    ]
}

fn apply(ops: &[Op]) -> (LongEntityMap<u32>, HashMap<u64, u32>) {
    let mut table = LongEntityMap::new();
    let mut model = HashMap::new();
    for op in ops {
        match *op {
            Op::Put(k, v) => {
                assert_eq!(table.put(k, v), model.insert(k, v));
            }
            Op::Remove(k) => {
                assert_eq!(table.remove(k), model.remove(&k));
            }
        }
    }
    (table, model)
}

// =============================================================================
// Table Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Replaying any log leaves the table equal to the model
    #[test]
    fn prop_table_matches_model(ops in ops_strategy()) {
        let (table, model) = apply(&ops);
        table.check_invariants();
        prop_assert_eq!(table.len(), model.len());
        for (k, v) in &model {
            prop_assert_eq!(table.get(*k), Some(v));
        }
        let keys: HashSet<u64> = table.keys().collect();
        let expected: HashSet<u64> = model.keys().copied().collect();
        prop_assert_eq!(keys, expected);
        prop_assert!(table.capacity().is_power_of_two());
    }

    /// The free marker itself can be stored and read back
    #[test]
    fn prop_sentinel_is_storable(ops in ops_strategy(), value in any::<u32>()) {
        let (mut table, mut model) = apply(&ops);
        let sentinel = table.free_key();
        table.put(sentinel, value);
        model.insert(sentinel, value);

        table.check_invariants();
        prop_assert_ne!(table.free_key(), sentinel);
        prop_assert_eq!(table.get(sentinel), Some(&value));
        for (k, v) in &model {
            prop_assert_eq!(table.get(*k), Some(v));
        }
    }

    /// A miss after churn probes no further than the same miss on a table
    /// built from the survivors alone at the same capacity
    #[test]
    fn prop_no_tombstones(ops in ops_strategy(), missing in any::<u64>()) {
        let (table, model) = apply(&ops);
        prop_assume!(!model.contains_key(&missing));
        prop_assume!(missing != table.free_key());

        let mut fresh = LongEntityMap::with_capacity(model.len());
        for (k, v) in &model {
            fresh.put(*k, *v);
        }
        prop_assert!(table.get(missing).is_none());
        prop_assert!(table.probe_length(missing) <= table.len() + 1);
        if fresh.capacity() == table.capacity() {
            prop_assert_eq!(table.probe_length(missing), fresh.probe_length(missing));
        }
    }

    /// `remove_if` removes exactly the matching keys and consults each key once
    #[test]
    fn prop_remove_if_matches_model(ops in ops_strategy(), modulus in 1u64..7) {
        let (mut table, model) = apply(&ops);
        let mut consulted = HashMap::new();
        let removed = table.remove_if(|k| {
            *consulted.entry(k).or_insert(0) += 1;
            k % modulus == 0
        });

        table.check_invariants();
        prop_assert!(consulted.values().all(|&n| n == 1));
        prop_assert_eq!(consulted.len(), model.len());
        prop_assert_eq!(removed, model.keys().any(|k| k % modulus == 0));
        for (k, v) in &model {
            if k % modulus == 0 {
                prop_assert!(table.get(*k).is_none());
            } else {
                prop_assert_eq!(table.get(*k), Some(v));
            }
        }
    }
}

// =============================================================================
// Composite Properties
// =============================================================================

/// Entities with distinct IDs, each tagged with the partition it lands in
fn partitioned_strategy() -> impl Strategy<Value = (usize, Vec<(u64, i64, usize)>)> {
    (1usize..8).prop_flat_map(|parts| {
        let entries = prop::collection::hash_map(any::<u64>(), (any::<i64>(), 0..parts), 0..200)
            .prop_map(|m| m.into_iter().map(|(k, (v, p))| (k, v, p)).collect::<Vec<_>>());
        (Just(parts), entries)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Sums and extremes over any partitioning equal those of the whole set
    #[test]
    fn prop_composite_aggregates((parts, entries) in partitioned_strategy()) {
        let sources: Vec<Arc<DefaultCacheView<i64>>> =
            (0..parts).map(|_| Arc::new(DefaultCacheView::new())).collect();
        for &(k, v, p) in &entries {
            sources[p].put_all(std::iter::once((k, v)));
        }
        let composite: CompositeCacheView<i64, DefaultCacheView<i64>> =
            CompositeCacheView::from_views(sources.clone());

        let per_source: usize = sources.iter().map(|s| s.len()).sum();
        prop_assert_eq!(composite.len(), entries.len());
        prop_assert_eq!(composite.len(), per_source);

        let positives = entries.iter().filter(|e| e.1 > 0).count();
        prop_assert_eq!(composite.count(|v| *v > 0), positives);

        let values: Vec<i64> = entries.iter().map(|e| e.1).collect();
        prop_assert_eq!(composite.min_by(|a, b| a.cmp(b)), values.iter().min().copied());
        prop_assert_eq!(composite.max_by(|a, b| a.cmp(b)), values.iter().max().copied());
        prop_assert_eq!(
            composite.reduce(|a, b| a.wrapping_add(b)),
            values.iter().copied().reduce(|a, b| a.wrapping_add(b))
        );

        for &(k, v, _) in &entries {
            prop_assert_eq!(composite.get(k), Some(v));
        }
        prop_assert_eq!(composite.entries().count(), entries.len());
    }
}
