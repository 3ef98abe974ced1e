//! Append-Only File Module
//!
//! Durable log of executed mutations, replayed at startup to rebuild state.
//!
//! ## File Format
//! A flat sequence of RESP array frames, one per mutating command. A
//! `SELECT <db>` frame precedes every entry whose database differs from the
//! previous entry's, and always precedes the first entry a writer emits:
//!
//! ```text
//! *2\r\n$6\r\nSELECT\r\n$1\r\n0\r\n
//! *3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n
//! *4\r\n$4\r\nZADD\r\n$1\r\nz\r\n$1\r\n1\r\n$1\r\na\r\n
//! ```
//!
//! ## Writer
//! Handlers queue `(db, line)` pairs into a bounded channel. One worker thread
//! drains it in order, so file order equals enqueue order. A full queue blocks
//! producers.

mod handler;
mod loader;

pub use handler::AofHandler;
pub use loader::{load, ReplayStats};
