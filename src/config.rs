//! Configuration for embedkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{KvError, Result};

/// Main configuration for an embedkv engine
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Keyspace Configuration
    // -------------------------------------------------------------------------
    /// Number of logical databases addressable with SELECT
    pub databases: usize,

    /// Shards per database. Rounded up to a power of two (minimum 16).
    /// The same count partitions both the key map and the key lock table.
    pub shard_count: usize,

    // -------------------------------------------------------------------------
    // AOF Configuration
    // -------------------------------------------------------------------------
    /// Record mutations to the append-only file and replay it on open
    pub append_only: bool,

    /// Location of the append-only file
    pub append_filename: PathBuf,

    /// Capacity of the queue in front of the AOF writer.
    /// Producers block once it is full.
    pub aof_queue_capacity: usize,

    /// How often the AOF writer forces data to disk
    pub aof_sync: AofSyncStrategy,

    // -------------------------------------------------------------------------
    // Client Configuration
    // -------------------------------------------------------------------------
    /// How long a client waits for a reply before giving up (milliseconds)
    pub request_timeout_ms: u64,

    /// Chunks buffered per direction of an in-process connection
    pub pipe_capacity: usize,
}

/// AOF sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AofSyncStrategy {
    /// fsync after every entry (safest, slowest)
    Always,

    /// fsync after N entries (balanced durability/performance)
    EveryNEntries { count: usize },

    /// flush to the OS and let it decide when to write back
    OsDefault,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            databases: 16,
            shard_count: 1024,
            append_only: false,
            append_filename: PathBuf::from("appendonly.aof"),
            aof_queue_capacity: 1 << 16,
            aof_sync: AofSyncStrategy::EveryNEntries { count: 128 },
            request_timeout_ms: 30_000,
            pipe_capacity: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.databases == 0 {
            return Err(KvError::Config("databases must be at least 1".to_string()));
        }
        if self.aof_queue_capacity == 0 {
            return Err(KvError::Config("aof_queue_capacity must be positive".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(KvError::Config("request_timeout_ms must be positive".to_string()));
        }
        if self.pipe_capacity == 0 {
            return Err(KvError::Config("pipe_capacity must be positive".to_string()));
        }
        if let AofSyncStrategy::EveryNEntries { count: 0 } = self.aof_sync {
            return Err(KvError::Config("aof sync count must be positive".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of logical databases
    pub fn databases(mut self, count: usize) -> Self {
        self.config.databases = count;
        self
    }

    /// Set the shard count used by maps and lock tables
    pub fn shard_count(mut self, count: usize) -> Self {
        self.config.shard_count = count;
        self
    }

    /// Enable the append-only file at the given path
    pub fn append_only(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.append_only = true;
        self.config.append_filename = path.into();
        self
    }

    /// Set the AOF queue capacity
    pub fn aof_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.aof_queue_capacity = capacity;
        self
    }

    /// Set the AOF sync strategy
    pub fn aof_sync(mut self, strategy: AofSyncStrategy) -> Self {
        self.config.aof_sync = strategy;
        self
    }

    /// Set the client wait timeout (in milliseconds)
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Set the per-direction pipe capacity
    pub fn pipe_capacity(mut self, capacity: usize) -> Self {
        self.config.pipe_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
