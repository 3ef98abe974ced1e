//! # embedkv
//!
//! An embeddable, RESP-compatible key-value and data-structure engine with:
//! - Strings, lists and sorted sets (skip list with spans)
//! - Striped key locking shared with the sharded key map
//! - MULTI/WATCH/EXEC transactions with undo-log rollback
//! - Append-only file persistence with startup replay
//! - In-process client connections over RESP byte streams
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             Client ── pipe ── ConnectionHandler              │
//! │                  (one thread per connection)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ command line
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │              (SELECT, panic containment)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Db (per index)                            │
//! │   CommandTable lookup ─► LockTable ─► handler ─► versions    │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                 ┌──────────────┐
//!   │ ConcurrentDict  │                 │  AofHandler  │
//!   │ Bytes/List/ZSet │                 │ (one thread) │
//!   └─────────────────┘                 └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod dict;
pub mod lock;
pub mod datastruct;
pub mod database;
pub mod command;
pub mod session;
pub mod aof;
pub mod engine;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, ReplyError, Result};
pub use config::{AofSyncStrategy, Config};
pub use engine::Engine;
pub use network::{Client, Endpoint};
pub use protocol::{cmd_line, CmdLine, Frame};
pub use session::{Connection, Session};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of embedkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
