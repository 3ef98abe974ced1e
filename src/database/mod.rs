//! Database Module
//!
//! One logical keyspace: the key map, its TTL index, per-key versions and the
//! key lock table.
//!
//! ## Request Path
//! ```text
//! exec(line)
//!   │  lookup + arity check          (no side effects on failure)
//!   ▼
//! prepare(args) ──► (write keys, read keys)
//!   │
//!   ▼
//! LockTable::rw_locks ──► executor(db, args) ──► handler appends to AOF
//!   │
//!   ▼
//! bump versions of write keys, release locks (KeyGuard drop)
//! ```
//!
//! Expired keys are removed lazily, when a command touches them.

mod entity;
mod multi;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use bytes::Bytes;

use crate::aof::AofHandler;
use crate::command::{Command, CommandTable};
use crate::datastruct::{LinkedList, SortedSet};
use crate::dict::ConcurrentDict;
use crate::error::{panic_detail, ReplyError};
use crate::lock::{KeyGuard, LockTable};
use crate::protocol::{CmdLine, Frame};
use crate::session::Connection;

pub use entity::DataEntity;

/// A logical database
pub struct Db {
    index: usize,

    /// key -> value
    data: ConcurrentDict<DataEntity>,

    /// key -> absolute expiry
    ttl: ConcurrentDict<SystemTime>,

    /// key -> write counter, read by WATCH
    versions: ConcurrentDict<u32>,

    /// Striped command locks, same partitioning as `data`
    locks: LockTable,

    registry: Arc<CommandTable>,

    /// Set once AOF replay has finished
    aof: OnceLock<Arc<AofHandler>>,
}

impl Db {
    pub fn new(index: usize, shard_count: usize, registry: Arc<CommandTable>) -> Self {
        Self {
            index,
            data: ConcurrentDict::new(shard_count),
            ttl: ConcurrentDict::new(shard_count),
            versions: ConcurrentDict::new(shard_count),
            locks: LockTable::new(shard_count),
            registry,
            aof: OnceLock::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn registry(&self) -> &CommandTable {
        &self.registry
    }

    /// Start recording mutations. Only the first call has an effect.
    pub fn attach_aof(&self, handler: Arc<AofHandler>) {
        if self.aof.set(handler).is_err() {
            tracing::warn!("db {} already has an AOF handler", self.index);
        }
    }

    /// Queue a mutation for the AOF, if one is attached
    pub fn add_aof(&self, line: CmdLine) {
        if let Some(handler) = self.aof.get() {
            handler.add_aof(self.index, line);
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute one request for `conn`, handling the transaction commands
    pub fn exec(&self, conn: &mut dyn Connection, line: &[Bytes]) -> Frame {
        let Some(first) = line.first() else {
            return ReplyError::Argument("empty command".to_string()).into();
        };
        let name = String::from_utf8_lossy(first).to_ascii_lowercase();
        match name.as_str() {
            "multi" => self.start_multi(conn, line),
            "discard" => self.discard_multi(conn, line),
            "exec" => self.exec_queued(conn, line),
            "watch" => self.watch(conn, line),
            "unwatch" => self.unwatch(conn, line),
            _ if conn.in_multi() => self.enqueue(conn, line),
            _ => self.exec_normal(line),
        }
    }

    /// Lock, run and version one command
    pub fn exec_normal(&self, line: &[Bytes]) -> Frame {
        let command = match self.checked_command(line) {
            Ok(command) => command,
            Err(err) => return err.into(),
        };
        let args = &line[1..];
        let (write_keys, read_keys) = (command.prepare)(args);
        let _guard = self.locks.rw_locks(&write_keys, &read_keys);
        match (command.executor)(self, args) {
            Ok(reply) => {
                self.add_versions(&write_keys);
                reply
            }
            Err(err) => err.into(),
        }
    }

    /// Run one command while the caller already holds its locks
    pub fn exec_with_lock(&self, line: &[Bytes]) -> Frame {
        let command = match self.checked_command(line) {
            Ok(command) => command,
            Err(err) => return err.into(),
        };
        match (command.executor)(self, &line[1..]) {
            Ok(reply) => reply,
            Err(err) => err.into(),
        }
    }

    /// Run `f` on behalf of `line`, logging and swallowing a panic
    pub(crate) fn run_guarded<R>(&self, line: &[Bytes], f: impl FnOnce() -> R) -> Option<R> {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Some(result),
            Err(panic) => {
                tracing::error!(
                    "db {}: command '{}' panicked: {}",
                    self.index,
                    line.first().map(|name| String::from_utf8_lossy(name)).unwrap_or_default(),
                    panic_detail(panic.as_ref())
                );
                None
            }
        }
    }

    /// Commands that would undo `line`, computed from the current state
    pub fn get_undo_logs(&self, line: &[Bytes]) -> Vec<CmdLine> {
        match self.checked_command(line) {
            Ok(command) => match command.undo {
                Some(undo) => undo(self, &line[1..]),
                None => Vec::new(),
            },
            Err(_) => Vec::new(),
        }
    }

    /// Lock the stripes of the given keys
    pub fn rw_locks(&self, write_keys: &[Bytes], read_keys: &[Bytes]) -> KeyGuard<'_> {
        self.locks.rw_locks(write_keys, read_keys)
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.locks
    }

    fn checked_command(&self, line: &[Bytes]) -> Result<&Command, ReplyError> {
        let Some(first) = line.first() else {
            return Err(ReplyError::Argument("empty command".to_string()));
        };
        let name = String::from_utf8_lossy(first);
        let command = self
            .registry
            .lookup(&name)
            .ok_or_else(|| ReplyError::unknown_command(&name))?;
        if !command.accepts_arity(line.len()) {
            return Err(ReplyError::wrong_arity(&name));
        }
        Ok(command)
    }

    // =========================================================================
    // Versions
    // =========================================================================

    pub fn get_version(&self, key: &[u8]) -> u32 {
        self.versions.get(key).unwrap_or(0)
    }

    pub(crate) fn add_versions(&self, keys: &[Bytes]) {
        for key in keys {
            if self.versions.update_with(key, |version| *version = version.wrapping_add(1)).is_none() {
                self.versions.put(key.clone(), 1);
            }
        }
    }

    // =========================================================================
    // Entity access
    // =========================================================================

    /// Drop `key` if its deadline has passed. Returns true when it expired.
    fn expire_if_needed(&self, key: &[u8]) -> bool {
        match self.ttl.get(key) {
            Some(at) if at <= SystemTime::now() => {
                self.data.remove(key);
                self.ttl.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Run `f` on the live value at `key`
    pub fn with_entity<R>(&self, key: &[u8], f: impl FnOnce(&DataEntity) -> R) -> Option<R> {
        if self.expire_if_needed(key) {
            return None;
        }
        self.data.get_with(key, f)
    }

    /// Run `f` on the live value at `key`, mutably
    pub fn with_entity_mut<R>(&self, key: &[u8], f: impl FnOnce(&mut DataEntity) -> R) -> Option<R> {
        if self.expire_if_needed(key) {
            return None;
        }
        self.data.update_with(key, f)
    }

    pub fn with_list<R>(
        &self,
        key: &[u8],
        f: impl FnOnce(&LinkedList<Bytes>) -> R,
    ) -> Result<Option<R>, ReplyError> {
        self.with_entity(key, |entity| entity.as_list().map(f)).transpose()
    }

    pub fn with_list_mut<R>(
        &self,
        key: &[u8],
        f: impl FnOnce(&mut LinkedList<Bytes>) -> R,
    ) -> Result<Option<R>, ReplyError> {
        self.with_entity_mut(key, |entity| entity.as_list_mut().map(f)).transpose()
    }

    /// Like [`Db::with_list_mut`], creating an empty list when `key` is absent
    pub fn with_list_or_init<R>(
        &self,
        key: &[u8],
        f: impl FnOnce(&mut LinkedList<Bytes>) -> R,
    ) -> Result<R, ReplyError> {
        if !self.exists(key) {
            self.data.put(Bytes::copy_from_slice(key), DataEntity::List(LinkedList::new()));
        }
        self.with_list_mut(key, f)?.ok_or(ReplyError::Unknown)
    }

    pub fn with_zset<R>(&self, key: &[u8], f: impl FnOnce(&SortedSet) -> R) -> Result<Option<R>, ReplyError> {
        self.with_entity(key, |entity| entity.as_zset().map(f)).transpose()
    }

    pub fn with_zset_mut<R>(
        &self,
        key: &[u8],
        f: impl FnOnce(&mut SortedSet) -> R,
    ) -> Result<Option<R>, ReplyError> {
        self.with_entity_mut(key, |entity| entity.as_zset_mut().map(f)).transpose()
    }

    /// Like [`Db::with_zset_mut`], creating an empty set when `key` is absent
    pub fn with_zset_or_init<R>(&self, key: &[u8], f: impl FnOnce(&mut SortedSet) -> R) -> Result<R, ReplyError> {
        if !self.exists(key) {
            self.data.put(Bytes::copy_from_slice(key), DataEntity::SortedSet(SortedSet::new()));
        }
        self.with_zset_mut(key, f)?.ok_or(ReplyError::Unknown)
    }

    /// Snapshot of the value at `key`
    pub fn get_entity(&self, key: &[u8]) -> Option<DataEntity> {
        self.with_entity(key, DataEntity::clone)
    }

    /// Upsert. Returns true when the key was new.
    pub fn put_entity(&self, key: &[u8], entity: DataEntity) -> bool {
        self.expire_if_needed(key);
        self.data.put(Bytes::copy_from_slice(key), entity)
    }

    pub fn put_if_absent(&self, key: &[u8], entity: DataEntity) -> bool {
        self.expire_if_needed(key);
        self.data.put_if_absent(Bytes::copy_from_slice(key), entity)
    }

    pub fn put_if_exists(&self, key: &[u8], entity: DataEntity) -> bool {
        self.expire_if_needed(key);
        self.data.put_if_exists(key, entity)
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        !self.expire_if_needed(key) && self.data.contains_key(key)
    }

    /// Remove a key and its deadline. Returns true when a live key went.
    pub fn remove(&self, key: &[u8]) -> bool {
        let expired = self.expire_if_needed(key);
        self.ttl.remove(key);
        !expired && self.data.remove(key).is_some()
    }

    pub fn removes(&self, keys: &[Bytes]) -> usize {
        keys.iter().filter(|key| self.remove(key)).count()
    }

    /// Remove `key` if it holds an empty container
    pub fn remove_if_empty(&self, key: &[u8]) {
        if self.data.get_with(key, DataEntity::is_empty).unwrap_or(false) {
            self.data.remove(key);
            self.ttl.remove(key);
        }
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    pub fn expire(&self, key: &[u8], at: SystemTime) {
        self.ttl.put(Bytes::copy_from_slice(key), at);
    }

    /// Clear the deadline. Returns true when there was one.
    pub fn persist(&self, key: &[u8]) -> bool {
        self.ttl.remove(key).is_some()
    }

    /// Deadline of a live key
    pub fn ttl_of(&self, key: &[u8]) -> Option<SystemTime> {
        if self.expire_if_needed(key) {
            return None;
        }
        self.ttl.get(key)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Visit live keys with their deadline until `f` returns false
    pub fn for_each(&self, mut f: impl FnMut(&Bytes, &DataEntity, Option<SystemTime>) -> bool) {
        let now = SystemTime::now();
        self.data.for_each(|key, entity| {
            let deadline = self.ttl.get(key);
            if matches!(deadline, Some(at) if at <= now) {
                return true;
            }
            f(key, entity, deadline)
        });
    }

    /// Number of keys, including ones expired but not yet collected
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of keys with a deadline
    pub fn ttl_len(&self) -> usize {
        self.ttl.len()
    }

    pub fn keys(&self) -> Vec<Bytes> {
        self.data.keys()
    }

    pub fn random_keys(&self, limit: usize) -> Vec<Bytes> {
        self.data.random_keys(limit)
    }

    pub fn random_distinct_keys(&self, limit: usize) -> Vec<Bytes> {
        self.data.random_distinct_keys(limit)
    }
}
