//! Lock Module
//!
//! Striped reader-writer locks keyed by the same partition function as
//! [`crate::dict::ConcurrentDict`].
//!
//! ## Lock Ordering
//! A multi-key request computes the set of stripes it touches, sorts them
//! ascending and acquires them in that order: exclusive when any write key
//! falls in the stripe, shared otherwise. Release runs in descending order.
//! Every caller goes through the same ordering, so two requests sharing
//! stripes can never wait on each other in a cycle.
//!
//! These locks are separate from the map's internal shard locks. They guard
//! whole commands, while the map's locks guard single map operations.

use std::collections::BTreeMap;

use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dict::{compute_capacity, spread};

/// Fixed array of reader-writer locks
pub struct LockTable {
    stripes: Vec<RwLock<()>>,
}

impl LockTable {
    /// Create a table with `shard_count` rounded like the map's shard count
    pub fn new(shard_count: usize) -> Self {
        let shard_count = compute_capacity(shard_count);
        Self {
            stripes: (0..shard_count).map(|_| RwLock::new(())).collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.stripes.len()
    }

    /// Stripe index guarding `key`
    pub fn spread(&self, key: &[u8]) -> usize {
        spread(key, self.stripes.len())
    }

    /// Stripes a request would take, ascending, with `true` meaning exclusive
    pub fn lock_plan(&self, write_keys: &[Bytes], read_keys: &[Bytes]) -> Vec<(usize, bool)> {
        let mut plan: BTreeMap<usize, bool> = BTreeMap::new();
        for key in read_keys {
            plan.entry(self.spread(key)).or_insert(false);
        }
        for key in write_keys {
            plan.insert(self.spread(key), true);
        }
        plan.into_iter().collect()
    }

    /// Lock every stripe touched by the given keys
    pub fn rw_locks(&self, write_keys: &[Bytes], read_keys: &[Bytes]) -> KeyGuard<'_> {
        let held = self
            .lock_plan(write_keys, read_keys)
            .into_iter()
            .map(|(index, exclusive)| {
                let stripe = &self.stripes[index];
                let guard = if exclusive {
                    StripeGuard::Exclusive(stripe.write())
                } else {
                    StripeGuard::Shared(stripe.read())
                };
                (index, guard)
            })
            .collect();
        KeyGuard { held }
    }

    /// Exclusive lock on one key
    pub fn lock(&self, key: &[u8]) -> KeyGuard<'_> {
        self.rw_locks(&[Bytes::copy_from_slice(key)], &[])
    }

    /// Shared lock on one key
    pub fn rlock(&self, key: &[u8]) -> KeyGuard<'_> {
        self.rw_locks(&[], &[Bytes::copy_from_slice(key)])
    }
}

enum StripeGuard<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

impl StripeGuard<'_> {
    fn is_exclusive(&self) -> bool {
        matches!(self, StripeGuard::Exclusive(_))
    }
}

/// Holds stripe locks until dropped
#[must_use = "locks are released as soon as the guard is dropped"]
pub struct KeyGuard<'a> {
    /// Ascending by stripe index
    held: Vec<(usize, StripeGuard<'a>)>,
}

impl KeyGuard<'_> {
    /// Stripes held, ascending
    pub fn stripes(&self) -> impl Iterator<Item = usize> + '_ {
        self.held.iter().map(|(index, _)| *index)
    }

    /// Stripes held exclusively, ascending
    pub fn exclusive_stripes(&self) -> impl Iterator<Item = usize> + '_ {
        self.held
            .iter()
            .filter(|(_, guard)| guard.is_exclusive())
            .map(|(index, _)| *index)
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // descending release
        while let Some(stripe) = self.held.pop() {
            drop(stripe);
        }
    }
}
