//! Lock Table Tests
//!
//! Tests for stripe planning, lock modes and deadlock freedom.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use embedkv::lock::LockTable;

fn keys(names: &[&str]) -> Vec<Bytes> {
    names
        .iter()
        .map(|name| Bytes::copy_from_slice(name.as_bytes()))
        .collect()
}

// =============================================================================
// Plan Tests
// =============================================================================

#[test]
fn test_plan_is_sorted_and_deduplicated() {
    let table = LockTable::new(16);
    let names: Vec<Bytes> = (0..64).map(|i| Bytes::from(format!("k{}", i))).collect();
    let plan = table.lock_plan(&names, &[]);

    assert!(plan.len() <= 16);
    assert!(plan.windows(2).all(|pair| pair[0].0 < pair[1].0));
    assert!(plan.iter().all(|&(_, exclusive)| exclusive));
}

#[test]
fn test_write_wins_over_read_in_same_stripe() {
    let table = LockTable::new(16);
    let plan = table.lock_plan(&keys(&["same"]), &keys(&["same"]));
    assert_eq!(plan, vec![(table.spread(b"same"), true)]);

    let plan = table.lock_plan(&[], &keys(&["only-read"]));
    assert_eq!(plan, vec![(table.spread(b"only-read"), false)]);
}

#[test]
fn test_guard_reports_held_stripes() {
    let table = LockTable::new(16);
    let guard = table.rw_locks(&keys(&["a", "b"]), &keys(&["c"]));
    let held: Vec<usize> = guard.stripes().collect();
    let planned: Vec<usize> = table
        .lock_plan(&keys(&["a", "b"]), &keys(&["c"]))
        .into_iter()
        .map(|(index, _)| index)
        .collect();
    assert_eq!(held, planned);
}

#[test]
fn test_guard_modes_follow_plan() {
    let table = LockTable::new(16);
    let write = keys(&["w"]);
    let read = keys(&["r1", "r2", "r3"]);
    let guard = table.rw_locks(&write, &read);

    let exclusive: Vec<usize> = guard.exclusive_stripes().collect();
    let planned: Vec<usize> = table
        .lock_plan(&write, &read)
        .into_iter()
        .filter(|&(_, exclusive)| exclusive)
        .map(|(index, _)| index)
        .collect();
    assert_eq!(exclusive, planned);
    assert_eq!(exclusive, vec![table.spread(b"w")]);
}

#[test]
fn test_binary_keys_are_planned_by_raw_bytes() {
    let table = LockTable::new(1024);
    let plan = table.lock_plan(&[Bytes::from_static(b"\xff")], &[Bytes::from_static(b"\xfe")]);
    assert_eq!(plan.len(), 2);
    assert_ne!(table.spread(b"\xff"), table.spread(b"\xfe"));
}

#[test]
fn test_dropping_guard_releases_every_stripe() {
    let table = LockTable::new(16);
    let all: Vec<Bytes> = (0..64).map(|i| Bytes::from(format!("k{}", i))).collect();
    drop(table.rw_locks(&all, &[]));
    drop(table.rw_locks(&[], &all));
    let _again = table.rw_locks(&all, &[]);
}

// =============================================================================
// Mode Tests
// =============================================================================

#[test]
fn test_shared_locks_coexist() {
    let table = LockTable::new(16);
    let first = table.rlock(b"k");
    let second = table.rlock(b"k");
    drop(first);
    drop(second);
    // re-acquirable exclusively once both readers are gone
    let _exclusive = table.lock(b"k");
}

#[test]
fn test_exclusive_lock_serializes_writers() {
    let table = Arc::new(LockTable::new(16));
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let table = Arc::clone(&table);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            thread::spawn(move || {
                for _ in 0..50 {
                    let _guard = table.lock(b"hot");
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_micros(10));
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Deadlock Freedom Tests
// =============================================================================

#[test]
fn test_opposite_key_orders_do_not_deadlock() {
    let table = Arc::new(LockTable::new(16));
    let names: Vec<Bytes> = (0..32).map(|i| Bytes::from(format!("key-{}", i))).collect();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let table = Arc::clone(&table);
            let mut names = names.clone();
            if t % 2 == 1 {
                names.reverse();
            }
            thread::spawn(move || {
                for round in 0..200 {
                    let (write, read) = names.split_at((round + t) % names.len());
                    let _guard = table.rw_locks(write, read);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
