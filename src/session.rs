//! Client sessions
//!
//! Per-connection state the engine needs while executing commands: the
//! selected database and, for interactive clients, the MULTI/WATCH context.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::ReplyError;
use crate::protocol::CmdLine;

/// State of an open MULTI block or a set of WATCHed keys
#[derive(Debug, Default, Clone)]
pub struct TxContext {
    /// True between MULTI and EXEC/DISCARD
    pub multi: bool,

    /// Commands queued while in MULTI
    pub queue: Vec<CmdLine>,

    /// Watched key -> version observed at WATCH time
    pub watching: HashMap<Bytes, u32>,

    /// Errors found while queuing; any entry aborts EXEC
    pub errors: Vec<ReplyError>,
}

/// What the engine sees of a client
pub trait Connection: Send {
    fn db_index(&self) -> usize;

    fn select_db(&mut self, index: usize);

    /// Transaction slot, or `None` when this connection cannot run
    /// transactions
    fn transaction_slot(&mut self) -> Option<&mut Option<TxContext>> {
        None
    }

    fn in_multi(&mut self) -> bool {
        matches!(self.transaction_slot(), Some(Some(ctx)) if ctx.multi)
    }
}

/// An interactive client connection
#[derive(Debug, Default)]
pub struct Session {
    db_index: usize,
    tx: Option<TxContext>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open transaction context, if any
    pub fn transaction(&self) -> Option<&TxContext> {
        self.tx.as_ref()
    }
}

impl Connection for Session {
    fn db_index(&self) -> usize {
        self.db_index
    }

    fn select_db(&mut self, index: usize) {
        self.db_index = index;
    }

    fn transaction_slot(&mut self) -> Option<&mut Option<TxContext>> {
        Some(&mut self.tx)
    }
}

/// Stand-in used while replaying the append-only file.
///
/// Only tracks the selected database.
#[derive(Debug, Default)]
pub struct ReplayConnection {
    db_index: usize,
}

impl ReplayConnection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Connection for ReplayConnection {
    fn db_index(&self) -> usize {
        self.db_index
    }

    fn select_db(&mut self, index: usize) {
        self.db_index = index;
    }
}
