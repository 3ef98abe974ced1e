//! Transactions
//!
//! MULTI queues commands on the connection, WATCH records key versions, and
//! EXEC runs the queue under one lock acquisition covering every queued key.
//! Before each queued command runs, its undo lines are computed; if a command
//! fails or panics, the undo lines of the commands that already ran are
//! replayed newest first and EXEC reports an abort.

use std::collections::HashMap;

use bytes::Bytes;

use super::Db;
use crate::error::ReplyError;
use crate::protocol::{CmdLine, Frame};
use crate::session::{Connection, TxContext};

fn unsupported() -> Frame {
    ReplyError::Argument("transactions are not supported on this connection".to_string()).into()
}

impl Db {
    pub(super) fn start_multi(&self, conn: &mut dyn Connection, line: &[Bytes]) -> Frame {
        if line.len() != 1 {
            return ReplyError::wrong_arity("multi").into();
        }
        let Some(slot) = conn.transaction_slot() else {
            return unsupported();
        };
        let ctx = slot.get_or_insert_with(TxContext::default);
        if ctx.multi {
            return ReplyError::Argument("MULTI calls can not be nested".to_string()).into();
        }
        ctx.multi = true;
        Frame::ok()
    }

    pub(super) fn discard_multi(&self, conn: &mut dyn Connection, line: &[Bytes]) -> Frame {
        if line.len() != 1 {
            return ReplyError::wrong_arity("discard").into();
        }
        let Some(slot) = conn.transaction_slot() else {
            return unsupported();
        };
        if !matches!(*slot, Some(ref ctx) if ctx.multi) {
            return ReplyError::Argument("DISCARD without MULTI".to_string()).into();
        }
        *slot = None;
        Frame::ok()
    }

    pub(super) fn watch(&self, conn: &mut dyn Connection, line: &[Bytes]) -> Frame {
        if line.len() < 2 {
            return ReplyError::wrong_arity("watch").into();
        }
        let Some(slot) = conn.transaction_slot() else {
            return unsupported();
        };
        let ctx = slot.get_or_insert_with(TxContext::default);
        if ctx.multi {
            return ReplyError::Argument("WATCH inside MULTI is not allowed".to_string()).into();
        }
        for key in &line[1..] {
            ctx.watching.insert(key.clone(), self.get_version(key));
        }
        Frame::ok()
    }

    pub(super) fn unwatch(&self, conn: &mut dyn Connection, line: &[Bytes]) -> Frame {
        if line.len() != 1 {
            return ReplyError::wrong_arity("unwatch").into();
        }
        let Some(slot) = conn.transaction_slot() else {
            return unsupported();
        };
        if let Some(ctx) = slot.as_mut() {
            ctx.watching.clear();
        }
        if matches!(*slot, Some(ref ctx) if !ctx.multi) {
            *slot = None;
        }
        Frame::ok()
    }

    /// Queue a command inside MULTI, recording validation failures
    pub(super) fn enqueue(&self, conn: &mut dyn Connection, line: &[Bytes]) -> Frame {
        let checked = self.checked_command(line).map(|_| ());
        let Some(Some(ctx)) = conn.transaction_slot() else {
            return unsupported();
        };
        match checked {
            Ok(()) => {
                ctx.queue.push(line.to_vec());
                Frame::queued()
            }
            Err(err) => {
                ctx.errors.push(err.clone());
                err.into()
            }
        }
    }

    pub(super) fn exec_queued(&self, conn: &mut dyn Connection, line: &[Bytes]) -> Frame {
        if line.len() != 1 {
            return ReplyError::wrong_arity("exec").into();
        }
        let Some(slot) = conn.transaction_slot() else {
            return unsupported();
        };
        let ctx = match slot.take() {
            Some(ctx) if ctx.multi => ctx,
            other => {
                *slot = other;
                return ReplyError::Argument("EXEC without MULTI".to_string()).into();
            }
        };
        if !ctx.errors.is_empty() {
            return ReplyError::TransactionAbort(
                "Transaction discarded because of previous errors.".to_string(),
            )
            .into();
        }
        self.exec_multi(&ctx.watching, &ctx.queue)
    }

    /// Run `lines` atomically, aborting if any watched version moved
    pub fn exec_multi(&self, watching: &HashMap<Bytes, u32>, lines: &[CmdLine]) -> Frame {
        let mut write_keys = Vec::new();
        let mut read_keys = Vec::new();
        for line in lines {
            match self.checked_command(line) {
                Ok(command) => {
                    let (write, read) = (command.prepare)(&line[1..]);
                    write_keys.extend(write);
                    read_keys.extend(read);
                }
                Err(err) => {
                    return ReplyError::TransactionAbort(format!(
                        "Transaction discarded because of previous errors. {}",
                        err
                    ))
                    .into();
                }
            }
        }
        read_keys.extend(watching.keys().cloned());

        let _guard = self.rw_locks(&write_keys, &read_keys);
        if self.watched_changed(watching) {
            return ReplyError::TransactionAbort(
                "Transaction aborted because watched keys changed".to_string(),
            )
            .into();
        }

        let mut results = Vec::with_capacity(lines.len());
        let mut undo_logs: Vec<Vec<CmdLine>> = Vec::with_capacity(lines.len());
        let mut failure = None;
        for line in lines {
            let Some(undo) = self.run_guarded(line, || self.get_undo_logs(line)) else {
                failure = Some(ReplyError::Unknown.to_string());
                break;
            };
            match self.run_guarded(line, || self.exec_with_lock(line)) {
                // a command that returned an error changed nothing
                Some(Frame::Error(message)) => {
                    failure = Some(message);
                    break;
                }
                Some(reply) => {
                    undo_logs.push(undo);
                    results.push(reply);
                }
                // a panic may have left partial writes behind, so its undo runs too
                None => {
                    undo_logs.push(undo);
                    failure = Some(ReplyError::Unknown.to_string());
                    break;
                }
            }
        }

        match failure {
            None => {
                self.add_versions(&write_keys);
                Frame::Array(Some(results))
            }
            Some(message) => {
                tracing::debug!(
                    "db {}: rolling back {} command(s) after: {}",
                    self.index,
                    undo_logs.len(),
                    message
                );
                for undo_lines in undo_logs.iter().rev() {
                    for undo_line in undo_lines {
                        let reply = self.run_guarded(undo_line, || self.exec_with_lock(undo_line));
                        if let Some(Frame::Error(err)) = reply {
                            tracing::warn!("db {}: undo command failed: {}", self.index, err);
                        }
                    }
                }
                ReplyError::TransactionAbort(format!("Transaction rolled back: {}", message)).into()
            }
        }
    }

    fn watched_changed(&self, watching: &HashMap<Bytes, u32>) -> bool {
        watching
            .iter()
            .any(|(key, &version)| self.get_version(key) != version)
    }
}
