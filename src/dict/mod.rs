//! Dict Module
//!
//! Sharded concurrent hash map backing every keyspace.
//!
//! ## Sharding
//! ```text
//! key ──fnv32──► hash ──& (shards - 1)──► shard index
//!
//!  ┌─────────┐ ┌─────────┐       ┌─────────┐
//!  │ RwLock  │ │ RwLock  │  ...  │ RwLock  │
//!  │ HashMap │ │ HashMap │       │ HashMap │
//!  └─────────┘ └─────────┘       └─────────┘
//! ```
//!
//! The shard of a key is a pure function of its bytes and the shard count, so
//! the lock table in [`crate::lock`] can stripe on exactly the same partitions.
//! The live key count is kept in an atomic outside the shard locks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use rand::Rng;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Smallest shard count a map or lock table will use
pub const MIN_SHARDS: usize = 16;

/// 32-bit FNV-1 hash
pub fn fnv32(key: &[u8]) -> u32 {
    key.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        hash.wrapping_mul(FNV_PRIME) ^ u32::from(*byte)
    })
}

/// Round a requested shard count up to a power of two, at least [`MIN_SHARDS`]
pub fn compute_capacity(requested: usize) -> usize {
    requested.max(MIN_SHARDS).next_power_of_two()
}

/// Map a key to its shard index. `shard_count` must be a power of two.
pub fn spread(key: &[u8], shard_count: usize) -> usize {
    (fnv32(key) as usize) & (shard_count - 1)
}

/// Thread-safe map from binary keys to `V`
pub struct ConcurrentDict<V> {
    shards: Vec<RwLock<HashMap<Bytes, V>>>,
    count: AtomicUsize,
}

impl<V> ConcurrentDict<V> {
    /// Create a map with `shard_count` rounded by [`compute_capacity`]
    pub fn new(shard_count: usize) -> Self {
        let shard_count = compute_capacity(shard_count);
        let shards = (0..shard_count)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            shards,
            count: AtomicUsize::new(0),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard index for `key`
    pub fn spread(&self, key: &[u8]) -> usize {
        spread(key, self.shards.len())
    }

    fn shard(&self, key: &[u8]) -> &RwLock<HashMap<Bytes, V>> {
        &self.shards[self.spread(key)]
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// Run `f` on the value under the shard's read lock
    pub fn get_with<R>(&self, key: &[u8], f: impl FnOnce(&V) -> R) -> Option<R> {
        self.shard(key).read().get(key).map(f)
    }

    /// Run `f` on the value under the shard's write lock
    pub fn update_with<R>(&self, key: &[u8], f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.shard(key).write().get_mut(key).map(f)
    }

    /// Upsert. Returns true when the key was new.
    pub fn put(&self, key: impl Into<Bytes>, value: V) -> bool {
        let key = key.into();
        let mut shard = self.shard(&key).write();
        let is_new = shard.insert(key, value).is_none();
        if is_new {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        is_new
    }

    /// Insert only when absent. Returns true when inserted.
    pub fn put_if_absent(&self, key: impl Into<Bytes>, value: V) -> bool {
        let key = key.into();
        let mut shard = self.shard(&key).write();
        if shard.contains_key(&key) {
            return false;
        }
        shard.insert(key, value);
        self.count.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Replace only when present. Returns true when replaced.
    pub fn put_if_exists(&self, key: &[u8], value: V) -> bool {
        let mut shard = self.shard(key).write();
        match shard.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &[u8]) -> Option<V> {
        let removed = self.shard(key).write().remove(key);
        if removed.is_some() {
            self.count.fetch_sub(1, Ordering::SeqCst);
        }
        removed
    }

    /// Visit every entry until `f` returns false.
    ///
    /// Each shard is read-locked only while it is being visited, so the view
    /// is weakly consistent across shards.
    pub fn for_each(&self, mut f: impl FnMut(&Bytes, &V) -> bool) {
        for shard in &self.shards {
            let shard = shard.read();
            for (key, value) in shard.iter() {
                if !f(key, value) {
                    return;
                }
            }
        }
    }

    pub fn keys(&self) -> Vec<Bytes> {
        let mut keys = Vec::with_capacity(self.len());
        self.for_each(|key, _| {
            keys.push(key.clone());
            true
        });
        keys
    }

    /// Sample `limit` keys with replacement
    pub fn random_keys(&self, limit: usize) -> Vec<Bytes> {
        if limit >= self.len() {
            return self.keys();
        }
        let mut rng = rand::thread_rng();
        let mut result = Vec::with_capacity(limit);
        while result.len() < limit && !self.is_empty() {
            if let Some(key) = self.random_key_in(rng.gen_range(0..self.shards.len())) {
                result.push(key);
            }
        }
        result
    }

    /// Sample up to `limit` distinct keys
    pub fn random_distinct_keys(&self, limit: usize) -> Vec<Bytes> {
        if limit >= self.len() {
            return self.keys();
        }
        let mut rng = rand::thread_rng();
        let mut result: Vec<Bytes> = Vec::with_capacity(limit);
        while result.len() < limit && result.len() < self.len() {
            if let Some(key) = self.random_key_in(rng.gen_range(0..self.shards.len())) {
                if !result.contains(&key) {
                    result.push(key);
                }
            }
        }
        result
    }

    fn random_key_in(&self, index: usize) -> Option<Bytes> {
        let shard = self.shards[index].read();
        if shard.is_empty() {
            return None;
        }
        let nth = rand::thread_rng().gen_range(0..shard.len());
        shard.keys().nth(nth).cloned()
    }

    /// Drop every entry
    pub fn clear(&self) {
        for shard in &self.shards {
            let mut shard = shard.write();
            let removed = shard.len();
            shard.clear();
            self.count.fetch_sub(removed, Ordering::SeqCst);
        }
    }
}

impl<V: Clone> ConcurrentDict<V> {
    pub fn get(&self, key: &[u8]) -> Option<V> {
        self.shard(key).read().get(key).cloned()
    }
}
