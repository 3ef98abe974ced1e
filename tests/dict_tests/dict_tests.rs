//! Concurrent Dict Tests
//!
//! Tests for the sharded map: upsert semantics, the live counter, sampling
//! and concurrent access.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use embedkv::dict::{compute_capacity, spread, ConcurrentDict};
use embedkv::lock::LockTable;

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_put_reports_new_keys() {
    let dict = ConcurrentDict::new(16);
    assert!(dict.put("a", 1));
    assert!(!dict.put("a", 2));
    assert_eq!(dict.get(b"a"), Some(2));
    assert_eq!(dict.len(), 1);
}

#[test]
fn test_put_if_absent_and_if_exists() {
    let dict = ConcurrentDict::new(16);
    assert!(!dict.put_if_exists(b"k", 1));
    assert_eq!(dict.get(b"k"), None);

    assert!(dict.put_if_absent("k", 1));
    assert!(!dict.put_if_absent("k", 2));
    assert_eq!(dict.get(b"k"), Some(1));

    assert!(dict.put_if_exists(b"k", 3));
    assert_eq!(dict.get(b"k"), Some(3));
    assert_eq!(dict.len(), 1);
}

#[test]
fn test_remove_returns_value() {
    let dict = ConcurrentDict::new(16);
    dict.put("k", "v".to_string());
    assert_eq!(dict.remove(b"k"), Some("v".to_string()));
    assert_eq!(dict.remove(b"k"), None);
    assert!(dict.is_empty());
}

#[test]
fn test_update_with_mutates_in_place() {
    let dict = ConcurrentDict::new(16);
    dict.put("n", 10);
    assert_eq!(dict.update_with(b"n", |n| {
        *n += 5;
        *n
    }), Some(15));
    assert_eq!(dict.update_with(b"missing", |n: &mut i32| *n), None);
    assert_eq!(dict.get(b"n"), Some(15));
}

#[test]
fn test_for_each_can_stop_early() {
    let dict = ConcurrentDict::new(16);
    for i in 0..100 {
        dict.put(format!("k{}", i), i);
    }
    let mut seen = 0;
    dict.for_each(|_, _| {
        seen += 1;
        seen < 10
    });
    assert_eq!(seen, 10);
}

#[test]
fn test_clear_resets_count() {
    let dict = ConcurrentDict::new(16);
    for i in 0..50 {
        dict.put(format!("k{}", i), i);
    }
    dict.clear();
    assert_eq!(dict.len(), 0);
    assert!(dict.keys().is_empty());
}

#[test]
fn test_binary_keys_are_distinct() {
    let dict = ConcurrentDict::new(16);
    assert!(dict.put(&b"\xff"[..], 1));
    assert!(dict.put(&b"\xfe"[..], 2));
    assert_eq!(dict.len(), 2);
    assert_eq!(dict.get(b"\xff"), Some(1));
    assert_eq!(dict.get(b"\xfe"), Some(2));
}

// =============================================================================
// Counter Invariant Tests
// =============================================================================

#[test]
fn test_len_matches_retrievable_keys() {
    let dict = ConcurrentDict::new(16);
    for i in 0..200 {
        dict.put(format!("k{}", i % 120), i);
    }
    for i in (0..120).step_by(3) {
        dict.remove(format!("k{}", i).as_bytes());
    }
    dict.remove(b"never-inserted");

    let retrievable = (0..120)
        .filter(|i| dict.get(format!("k{}", i).as_bytes()).is_some())
        .count();
    assert_eq!(dict.len(), retrievable);
    assert_eq!(dict.keys().len(), retrievable);
}

#[test]
fn test_concurrent_puts_and_removes_keep_count() {
    let dict = Arc::new(ConcurrentDict::new(64));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let dict = Arc::clone(&dict);
            thread::spawn(move || {
                for i in 0..1000 {
                    let key = format!("t{}-{}", t, i);
                    dict.put(key.clone(), i);
                    if i % 2 == 0 {
                        dict.remove(key.as_bytes());
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(dict.len(), 8 * 500);
    assert_eq!(dict.keys().len(), 8 * 500);
}

// =============================================================================
// Sampling Tests
// =============================================================================

#[test]
fn test_random_keys_samples_existing_keys() {
    let dict = ConcurrentDict::new(16);
    for i in 0..100 {
        dict.put(format!("k{}", i), i);
    }
    let sample = dict.random_keys(20);
    assert_eq!(sample.len(), 20);
    assert!(sample.iter().all(|key| dict.contains_key(key)));
}

#[test]
fn test_random_distinct_keys_has_no_duplicates() {
    let dict = ConcurrentDict::new(16);
    for i in 0..100 {
        dict.put(format!("k{}", i), i);
    }
    let sample = dict.random_distinct_keys(30);
    let unique: HashSet<_> = sample.iter().collect();
    assert_eq!(sample.len(), 30);
    assert_eq!(unique.len(), 30);
}

#[test]
fn test_sampling_more_than_len_returns_everything() {
    let dict = ConcurrentDict::new(16);
    dict.put("a", 1);
    dict.put("b", 2);
    let mut keys = dict.random_distinct_keys(10);
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
}

// =============================================================================
// Sharding Tests
// =============================================================================

#[test]
fn test_shard_count_is_rounded() {
    assert_eq!(ConcurrentDict::<u8>::new(1).shard_count(), 16);
    assert_eq!(ConcurrentDict::<u8>::new(100).shard_count(), 128);
    assert_eq!(compute_capacity(1024), 1024);
}

#[test]
fn test_shard_function_is_stable_and_shared_with_locks() {
    let dict = ConcurrentDict::<u8>::new(256);
    let locks = LockTable::new(256);
    assert_eq!(dict.shard_count(), locks.shard_count());

    for i in 0..500 {
        let key = format!("key:{}", i);
        let shard = dict.spread(key.as_bytes());
        assert_eq!(shard, dict.spread(key.as_bytes()));
        assert_eq!(shard, locks.spread(key.as_bytes()));
        assert_eq!(shard, spread(key.as_bytes(), 256));
        assert!(shard < 256);
    }
}
