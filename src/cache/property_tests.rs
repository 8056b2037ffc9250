//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store against a plain HashMap model.

use proptest::prelude::*;
use std::cell::Cell;
use std::collections::HashMap;

use chrono::{TimeDelta, Utc};

use crate::cache::Cache;
use crate::policy::{CompareValuePolicy, TimeoutPolicy};

// == Strategies ==
/// Generates cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,32}".prop_map(|s| s)
}

/// Generates keys from a small pool so operations collide
fn pooled_key_strategy() -> impl Strategy<Value = String> {
    "[a-d]".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: i64 },
    Get { key: String },
    Remove { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (pooled_key_strategy(), any::<i64>()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        pooled_key_strategy().prop_map(|key| CacheOp::Get { key }),
        pooled_key_strategy().prop_map(|key| CacheOp::Remove { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any sequence of put/get/remove behaves like a HashMap while nothing
    // expires, and the counters match the lookups made.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let mut cache = Cache::new();
        let mut model: HashMap<String, i64> = HashMap::new();
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    cache.put(key.clone(), value);
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    let expected = model.get(&key).copied();
                    if expected.is_some() {
                        expected_hits += 1;
                    } else {
                        expected_misses += 1;
                    }
                    prop_assert_eq!(cache.get::<i64>(&key).unwrap(), expected);
                }
                CacheOp::Remove { key } => {
                    prop_assert_eq!(cache.remove(&key), model.remove(&key).is_some());
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, model.len());
    }

    // Storing then reading a value returns it unchanged.
    #[test]
    fn prop_roundtrip(key in key_strategy(), value in ".*") {
        let mut cache = Cache::new();

        cache.put(key.clone(), value.clone());
        prop_assert_eq!(cache.get::<String>(&key).unwrap(), Some(value));
    }

    // Removing a key makes it absent.
    #[test]
    fn prop_remove_makes_absent(key in key_strategy(), value in any::<u32>()) {
        let mut cache = Cache::new();

        cache.put(key.clone(), value);
        prop_assert!(cache.remove(&key));
        prop_assert_eq!(cache.get::<u32>(&key).unwrap(), None);
    }

    // Expiring or removing one key never touches another.
    #[test]
    fn prop_independent_keys(a in key_strategy(), b in key_strategy(), va in any::<u32>(), vb in any::<u32>()) {
        prop_assume!(a != b);
        let mut cache = Cache::new();

        cache.put(a.clone(), va);
        cache.put_with_policy(b.clone(), vb, TimeoutPolicy::new(0));

        prop_assert_eq!(cache.get::<u32>(&b).unwrap(), None);
        prop_assert_eq!(cache.get::<u32>(&a).unwrap(), Some(va));

        cache.put(b.clone(), vb);
        cache.remove(&a);
        prop_assert_eq!(cache.get::<u32>(&b).unwrap(), Some(vb));
    }

    // The producer runs once however often a fresh key is requested.
    #[test]
    fn prop_compute_once(key in key_strategy(), value in any::<i32>(), calls in 1usize..20) {
        let mut cache = Cache::new();
        let runs = Cell::new(0);

        for _ in 0..calls {
            let got = cache
                .get_or_compute(&key, || {
                    runs.set(runs.get() + 1);
                    value
                })
                .unwrap();
            prop_assert_eq!(got, value);
        }

        prop_assert_eq!(runs.get(), 1);
    }

    // An entry is fresh before its timeout elapses and gone after.
    #[test]
    fn prop_timeout_boundary(timeout in 2u64..10_000, elapsed in 0u64..20_000) {
        prop_assume!(elapsed + 1 < timeout || elapsed > timeout);
        let mut cache = Cache::new();

        let created_at = Utc::now() - TimeDelta::seconds(elapsed as i64);
        cache.put_with_policy("k", 1u8, TimeoutPolicy::with_created_at(created_at, timeout));

        let expected = if elapsed < timeout { Some(1u8) } else { None };
        prop_assert_eq!(cache.get::<u8>("k").unwrap(), expected);
        prop_assert_eq!(cache.len(), usize::from(expected.is_some()));
    }

    // A compare-value policy expires exactly when the tracked value differs
    // from the previous one.
    #[test]
    fn prop_compare_value_tracks_changes(seed in 0u8..4, values in prop::collection::vec(0u8..4, 1..40)) {
        let mut cache = Cache::new();
        let policy = CompareValuePolicy::get_policy(&mut cache, "tracked", seed).unwrap();
        let mut previous = seed;

        for value in values {
            prop_assert_eq!(policy.check_and_advance(&mut cache, value), value != previous);
            previous = value;
        }
    }
}
