//! Engine Module
//!
//! The multi-database container external callers talk to.
//!
//! ## Responsibilities
//! - Own the logical databases and the shared command table
//! - Route each command line to the connection's selected database
//! - Handle SELECT, which changes connection state rather than data
//! - Replay the AOF on open, then attach the writer to every database
//! - Contain handler panics so one bad command cannot take down the process

use std::fs::OpenOptions;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;

use crate::aof::{self, AofHandler};
use crate::command::{arg_text, CommandTable};
use crate::config::Config;
use crate::database::{DataEntity, Db};
use crate::error::{panic_detail, ReplyError, Result};
use crate::lock::KeyGuard;
use crate::protocol::{CmdLine, Frame};
use crate::session::Connection;

/// The storage engine: a fixed set of logical databases
///
/// ## Concurrency Model
/// - Every database locks by key stripe (see [`crate::lock::LockTable`])
/// - The command table is read-only after `open`
/// - AOF writes are serialized by one background thread
pub struct Engine {
    /// Engine configuration
    config: Config,

    dbs: Vec<Arc<Db>>,

    /// AOF writer, present when append-only mode is on
    aof: Option<Arc<AofHandler>>,

    closed: AtomicBool,
}

impl Engine {
    /// Open an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Create the databases around one command table
    /// 3. Replay the AOF if append-only mode is on, cutting off a partial tail
    /// 4. Attach the AOF writer so new mutations are recorded
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_registry(config, CommandTable::standard())
    }

    /// Like [`Engine::open`], serving the commands in `registry`
    pub fn open_with_registry(config: Config, registry: CommandTable) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(registry);
        let dbs = (0..config.databases)
            .map(|index| Arc::new(Db::new(index, config.shard_count, Arc::clone(&registry))))
            .collect();

        let mut engine = Self {
            config,
            dbs,
            aof: None,
            closed: AtomicBool::new(false),
        };

        if engine.config.append_only {
            // Replay runs before the writer is attached, so replayed commands
            // are not appended a second time.
            let stats = aof::load(&engine, &engine.config.append_filename, 0)?;
            if stats.truncated {
                // new entries must not follow a partial frame
                tracing::warn!(
                    "truncating AOF {:?} to its last whole frame ({} bytes)",
                    engine.config.append_filename,
                    stats.valid_bytes
                );
                OpenOptions::new()
                    .write(true)
                    .open(&engine.config.append_filename)?
                    .set_len(stats.valid_bytes)?;
            }
            let handler = Arc::new(AofHandler::open(&engine.config)?);
            for db in &engine.dbs {
                db.attach_aof(Arc::clone(&handler));
            }
            engine.aof = Some(handler);
        }

        tracing::info!(
            "engine open: {} database(s), {} command(s), append-only {}",
            engine.dbs.len(),
            registry.len(),
            if engine.config.append_only { "on" } else { "off" }
        );
        Ok(engine)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute one command line against the connection's selected database
    pub fn exec(&self, conn: &mut dyn Connection, line: &[Bytes]) -> Frame {
        let Some(first) = line.first() else {
            return ReplyError::Argument("empty command".to_string()).into();
        };
        if first.eq_ignore_ascii_case(b"select") {
            return self.select(conn, line);
        }

        let db = match self.db(conn.db_index()) {
            Ok(db) => db,
            Err(err) => return err.into(),
        };
        match catch_unwind(AssertUnwindSafe(|| db.exec(conn, line))) {
            Ok(reply) => reply,
            Err(panic) => {
                tracing::error!(
                    "command '{}' panicked: {}",
                    String::from_utf8_lossy(first),
                    panic_detail(panic.as_ref())
                );
                ReplyError::Unknown.into()
            }
        }
    }

    fn select(&self, conn: &mut dyn Connection, line: &[Bytes]) -> Frame {
        if conn.in_multi() {
            let err = ReplyError::Argument("cannot select database within multi".to_string());
            if let Some(Some(ctx)) = conn.transaction_slot() {
                ctx.errors.push(err.clone());
            }
            return err.into();
        }
        if line.len() != 2 {
            return ReplyError::wrong_arity("select").into();
        }
        let Ok(index) = arg_text(&line[1]).parse::<usize>() else {
            return ReplyError::not_integer().into();
        };
        if index >= self.dbs.len() {
            return ReplyError::Addressing.into();
        }
        conn.select_db(index);
        Frame::ok()
    }

    /// Execute on database `db_index` while the caller holds the key locks
    pub fn exec_with_lock(&self, db_index: usize, line: &[Bytes]) -> Frame {
        match self.db(db_index) {
            Ok(db) => db.exec_with_lock(line),
            Err(err) => err.into(),
        }
    }

    /// Execute `lines` atomically on database `db_index`
    pub fn exec_multi(&self, db_index: usize, lines: &[CmdLine]) -> Frame {
        match self.db(db_index) {
            Ok(db) => db.exec_multi(&Default::default(), lines),
            Err(err) => err.into(),
        }
    }

    /// Lock the stripes of the given keys in database `db_index`
    pub fn rw_locks(
        &self,
        db_index: usize,
        write_keys: &[Bytes],
        read_keys: &[Bytes],
    ) -> std::result::Result<KeyGuard<'_>, ReplyError> {
        Ok(self.db(db_index)?.rw_locks(write_keys, read_keys))
    }

    /// Commands that would undo `line` on database `db_index`
    pub fn get_undo_logs(&self, db_index: usize, line: &[Bytes]) -> Vec<CmdLine> {
        match self.db(db_index) {
            Ok(db) => db.get_undo_logs(line),
            Err(_) => Vec::new(),
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Visit live keys of database `db_index` with their deadlines
    pub fn for_each(
        &self,
        db_index: usize,
        f: impl FnMut(&Bytes, &DataEntity, Option<SystemTime>) -> bool,
    ) -> std::result::Result<(), ReplyError> {
        self.db(db_index)?.for_each(f);
        Ok(())
    }

    /// `(keys, keys with a deadline)` of database `db_index`
    pub fn db_size(&self, db_index: usize) -> std::result::Result<(usize, usize), ReplyError> {
        let db = self.db(db_index)?;
        Ok((db.len(), db.ttl_len()))
    }

    pub fn random_keys(&self, db_index: usize, limit: usize) -> Vec<Bytes> {
        self.db(db_index)
            .map(|db| db.random_keys(limit))
            .unwrap_or_default()
    }

    pub fn random_distinct_keys(&self, db_index: usize, limit: usize) -> Vec<Bytes> {
        self.db(db_index)
            .map(|db| db.random_distinct_keys(limit))
            .unwrap_or_default()
    }

    /// Database at `index`
    pub fn db(&self, index: usize) -> std::result::Result<&Arc<Db>, ReplyError> {
        self.dbs.get(index).ok_or(ReplyError::Addressing)
    }

    pub fn databases(&self) -> usize {
        self.dbs.len()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Drain and close the AOF. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(handler) = &self.aof {
            handler.close()?;
        }
        tracing::info!("engine closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!("engine close failed: {}", err);
        }
    }
}
