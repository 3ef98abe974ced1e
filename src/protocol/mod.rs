//! Protocol Module
//!
//! Defines the RESP-style wire protocol shared by requests, replies and the
//! append-only file.
//!
//! ## Frame Format
//! ```text
//! +OK\r\n                       simple status
//! -ERR message\r\n              error
//! :42\r\n                       integer
//! $5\r\nhello\r\n               bulk string      ($-1\r\n is null)
//! *2\r\n$3\r\nGET\r\n$1\r\nx\r\n  array          (*-1\r\n is null, *0\r\n empty)
//! ```
//!
//! Requests are arrays of bulk strings: the command name followed by its
//! arguments.

mod codec;
mod frame;

pub use codec::{decode, encode_command, encode_frame, write_frame, FrameReader, MAX_BULK_LEN};
pub use frame::{cmd_line, CmdLine, Frame};
