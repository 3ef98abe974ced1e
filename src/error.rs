//! Error types for embedkv
//!
//! Two families live here:
//! - [`KvError`]: infrastructure failures (I/O, framing, AOF, configuration).
//! - [`ReplyError`]: failures a client sees as an error frame. Every variant renders
//!   with a stable leading token (`ERR`, `WRONGTYPE`, `EXECABORT`, `TIMEOUT`) that
//!   callers may branch on; the rest of the message is for humans.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::Frame;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for engine infrastructure
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Wire Errors
    // -------------------------------------------------------------------------
    /// A single malformed frame. The stream stays usable.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The stream ended in the middle of a frame. The stream is finished.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("AOF error: {0}")]
    Aof(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Data Structure Errors
    // -------------------------------------------------------------------------
    #[error("index out of range: {0}")]
    OutOfRange(String),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("connection closed")]
    Closed,

    #[error("server time out after {0:?}")]
    Timeout(Duration),
}

impl KvError {
    /// True when the underlying stream cannot produce any more frames.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, KvError::Protocol(_))
    }
}

/// Client-visible error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("ERR Protocol error: {0}")]
    Protocol(String),

    /// Wrong arity, unknown command, unparsable argument or bad syntax.
    #[error("ERR {0}")]
    Argument(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR DB index is out of range")]
    Addressing,

    #[error("TIMEOUT server time out")]
    Timeout,

    #[error("EXECABORT {0}")]
    TransactionAbort(String),

    /// Last line of defense for faults inside a handler.
    #[error("ERR unknown")]
    Unknown,
}

impl ReplyError {
    pub fn syntax() -> Self {
        ReplyError::Argument("syntax error".to_string())
    }

    pub fn not_integer() -> Self {
        ReplyError::Argument("value is not an integer or out of range".to_string())
    }

    pub fn not_float() -> Self {
        ReplyError::Argument("value is not a valid float".to_string())
    }

    pub fn wrong_arity(name: &str) -> Self {
        ReplyError::Argument(format!(
            "wrong number of arguments for '{}' command",
            name.to_ascii_lowercase()
        ))
    }

    pub fn unknown_command(name: &str) -> Self {
        ReplyError::Argument(format!("unknown command '{}'", name))
    }

    /// The leading token of the rendered message.
    pub fn prefix(&self) -> &'static str {
        match self {
            ReplyError::WrongType => "WRONGTYPE",
            ReplyError::Timeout => "TIMEOUT",
            ReplyError::TransactionAbort(_) => "EXECABORT",
            _ => "ERR",
        }
    }
}

impl From<ReplyError> for Frame {
    fn from(err: ReplyError) -> Self {
        Frame::Error(err.to_string())
    }
}

impl From<&KvError> for ReplyError {
    fn from(err: &KvError) -> Self {
        match err {
            KvError::Protocol(msg) => ReplyError::Protocol(msg.clone()),
            KvError::Timeout(_) => ReplyError::Timeout,
            _ => ReplyError::Unknown,
        }
    }
}

/// Message carried by a caught panic payload, empty when it is not text
pub(crate) fn panic_detail(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default()
}
