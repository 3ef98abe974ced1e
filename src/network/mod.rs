//! Network Module
//!
//! In-process client access to an [`Engine`](crate::Engine) over RESP byte
//! streams, for collaborators that speak the wire protocol rather than calling
//! the engine directly.
//!
//! ## Architecture
//! ```text
//!  Client ──encode──► pipe ──► ConnectionHandler (one thread) ──► Engine
//!    ▲                                   │
//!    └── reader thread ◄── pipe ◄──encode┘
//! ```
//! - [`Endpoint`] creates connections and stops them all on close
//! - Replies are matched to requests in FIFO order per connection

mod client;
mod connection;
mod endpoint;
mod pipe;

pub use client::Client;
pub use connection::ConnectionHandler;
pub use endpoint::Endpoint;
pub use pipe::{pipe, PipeReader, PipeWriter};
