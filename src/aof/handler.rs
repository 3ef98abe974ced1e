//! AOF Writer
//!
//! Owns the append-only file through a single background thread.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::config::{AofSyncStrategy, Config};
use crate::error::{KvError, Result};
use crate::protocol::{encode_command, CmdLine};

/// One queued mutation
struct Payload {
    db_index: usize,
    line: CmdLine,
}

/// Front end of the AOF writer thread
pub struct AofHandler {
    path: PathBuf,

    /// `None` once closed; producers then drop their entries
    sender: RwLock<Option<Sender<Payload>>>,

    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AofHandler {
    /// Open (or create) the file named by the config and start the writer
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.append_filename.clone();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let (sender, receiver) = bounded(config.aof_queue_capacity);

        let writer = AofWriter {
            out: BufWriter::new(file),
            current_db: None,
            sync: config.aof_sync,
            unsynced: 0,
        };
        let worker = thread::Builder::new()
            .name("aof-writer".to_string())
            .spawn(move || writer.run(receiver))?;

        tracing::debug!("AOF writer started for {:?}", path);
        Ok(Self {
            path,
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue `line` for database `db_index`. Blocks while the queue is full.
    pub fn add_aof(&self, db_index: usize, line: CmdLine) {
        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            tracing::debug!("AOF closed, dropping entry for db {}", db_index);
            return;
        };
        if sender.send(Payload { db_index, line }).is_err() {
            tracing::warn!("AOF writer is gone, dropping entry for db {}", db_index);
        }
    }

    /// Stop accepting entries, drain the queue and close the file.
    /// Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        drop(self.sender.write().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker
                .join()
                .map_err(|_| KvError::Aof("AOF writer thread panicked".to_string()))?;
            tracing::debug!("AOF writer stopped for {:?}", self.path);
        }
        Ok(())
    }
}

impl Drop for AofHandler {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!("AOF close failed: {}", err);
        }
    }
}

// =============================================================================
// Writer thread
// =============================================================================

struct AofWriter {
    out: BufWriter<File>,

    /// Database of the last entry written; `None` forces a leading SELECT
    current_db: Option<usize>,

    sync: AofSyncStrategy,

    /// Entries written since the last fsync
    unsynced: usize,
}

impl AofWriter {
    fn run(mut self, receiver: Receiver<Payload>) {
        for payload in &receiver {
            self.write(payload);
            if receiver.is_empty() {
                self.flush();
            }
        }
        self.flush();
        if let Err(err) = self.out.get_ref().sync_all() {
            tracing::warn!("AOF final sync failed: {}", err);
        }
    }

    fn write(&mut self, payload: Payload) {
        if self.current_db != Some(payload.db_index) {
            let select = vec![
                Bytes::from_static(b"SELECT"),
                Bytes::from(payload.db_index.to_string()),
            ];
            if let Err(err) = self.out.write_all(&encode_command(&select)) {
                // without the SELECT the entry would land in the wrong database
                tracing::warn!("AOF write failed, dropping entry: {}", err);
                return;
            }
            self.current_db = Some(payload.db_index);
        }

        if let Err(err) = self.out.write_all(&encode_command(&payload.line)) {
            tracing::warn!("AOF write failed: {}", err);
            return;
        }
        self.unsynced += 1;

        match self.sync {
            AofSyncStrategy::Always => self.sync_data(),
            AofSyncStrategy::EveryNEntries { count } if self.unsynced >= count => self.sync_data(),
            _ => {}
        }
    }

    fn flush(&mut self) {
        if let Err(err) = self.out.flush() {
            tracing::warn!("AOF flush failed: {}", err);
        }
    }

    fn sync_data(&mut self) {
        self.flush();
        if let Err(err) = self.out.get_ref().sync_data() {
            tracing::warn!("AOF sync failed: {}", err);
        }
        self.unsynced = 0;
    }
}
