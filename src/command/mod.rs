//! Command Module
//!
//! The command registry and every command handler.
//!
//! ## Registration
//! Each command is described once by a [`Command`]:
//! - `executor`: runs against one [`Db`] with the arguments after the name
//! - `prepare`: names the keys the command writes and reads, so the executor
//!   can lock them before running it
//! - `undo`: builds the command lines that reverse it, from the state before
//!   it runs (used to roll back a failed EXEC)
//! - `arity`: argument count including the name; negative means "at least"
//!
//! A [`CommandTable`] is built once at startup and shared read-only by all
//! databases.

mod args;
mod keys;
mod list;
mod undo;
mod zset;

use std::collections::HashMap;

use bytes::Bytes;

use crate::database::Db;
use crate::error::ReplyError;
use crate::protocol::{CmdLine, Frame};

pub use args::{log_line, unix_millis};
pub(crate) use args::text as arg_text;
pub use undo::{rollback_first_key, rollback_given_keys, rollback_zset_fields};

/// Runs a command. Receives the arguments after the command name.
pub type ExecFn = fn(&Db, &[Bytes]) -> Result<Frame, ReplyError>;

/// Returns `(write_keys, read_keys)`
pub type PrepareFn = fn(&[Bytes]) -> (Vec<Bytes>, Vec<Bytes>);

/// Returns the command lines that undo the command
pub type UndoFn = fn(&Db, &[Bytes]) -> Vec<CmdLine>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFlag {
    ReadOnly,
    Write,
}

/// Registration record of one command
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub executor: ExecFn,
    pub prepare: PrepareFn,
    pub undo: Option<UndoFn>,
    pub arity: i32,
    pub flag: CommandFlag,
}

impl Command {
    /// Check an argument count that includes the command name
    pub fn accepts_arity(&self, argc: usize) -> bool {
        let argc = argc as i64;
        let arity = i64::from(self.arity);
        if arity >= 0 {
            argc == arity
        } else {
            argc >= -arity
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.flag == CommandFlag::ReadOnly
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("flag", &self.flag)
            .field("undo", &self.undo.is_some())
            .finish()
    }
}

/// Name -> command lookup table
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: HashMap<String, Command>,
}

impl CommandTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in command
    pub fn standard() -> Self {
        let mut table = Self::new();
        keys::register(&mut table);
        list::register(&mut table);
        zset::register(&mut table);
        table
    }

    /// Register (or replace) a command. Names are case-insensitive.
    pub fn register(
        &mut self,
        name: &str,
        executor: ExecFn,
        prepare: PrepareFn,
        undo: Option<UndoFn>,
        arity: i32,
        flag: CommandFlag,
    ) {
        let name = name.to_ascii_lowercase();
        self.commands.insert(
            name.clone(),
            Command {
                name,
                executor,
                prepare,
                undo,
                arity,
                flag,
            },
        );
    }

    /// Look up a command by name in any letter case
    pub fn lookup(&self, name: &str) -> Option<&Command> {
        match self.commands.get(name) {
            Some(command) => Some(command),
            None => self.commands.get(&name.to_ascii_lowercase()),
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.keys().map(String::as_str)
    }
}

// =============================================================================
// Key extractors
// =============================================================================

pub(crate) fn no_prepare(_args: &[Bytes]) -> (Vec<Bytes>, Vec<Bytes>) {
    (Vec::new(), Vec::new())
}

pub(crate) fn write_first_key(args: &[Bytes]) -> (Vec<Bytes>, Vec<Bytes>) {
    (args.iter().take(1).cloned().collect(), Vec::new())
}

pub(crate) fn read_first_key(args: &[Bytes]) -> (Vec<Bytes>, Vec<Bytes>) {
    (Vec::new(), args.iter().take(1).cloned().collect())
}

pub(crate) fn write_all_keys(args: &[Bytes]) -> (Vec<Bytes>, Vec<Bytes>) {
    (args.to_vec(), Vec::new())
}

pub(crate) fn read_all_keys(args: &[Bytes]) -> (Vec<Bytes>, Vec<Bytes>) {
    (Vec::new(), args.to_vec())
}

pub(crate) fn write_first_two_keys(args: &[Bytes]) -> (Vec<Bytes>, Vec<Bytes>) {
    (args.iter().take(2).cloned().collect(), Vec::new())
}
