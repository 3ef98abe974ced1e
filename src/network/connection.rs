//! Connection Handler
//!
//! Serves one client connection: decode a request, execute it, write the
//! reply, in order.

use std::io::{BufReader, BufWriter};
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::{KvError, ReplyError, Result};
use crate::protocol::{write_frame, Frame, FrameReader};
use crate::session::Session;

use super::pipe::{PipeReader, PipeWriter};

/// Handles a single client connection
pub struct ConnectionHandler {
    /// Request stream (buffered for efficiency)
    reader: FrameReader<BufReader<PipeReader>>,

    /// Reply stream (buffered for efficiency)
    writer: BufWriter<PipeWriter>,

    /// Reference to the storage engine
    engine: Arc<Engine>,

    /// Selected database and transaction state
    session: Session,

    /// Peer name for logging
    peer: String,
}

impl ConnectionHandler {
    pub fn new(
        reader: PipeReader,
        writer: PipeWriter,
        engine: Arc<Engine>,
        peer: impl Into<String>,
    ) -> Self {
        Self {
            reader: FrameReader::new(BufReader::new(reader)),
            writer: BufWriter::new(writer),
            engine,
            session: Session::new(),
            peer: peer.into(),
        }
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and sends replies.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established: {}", self.peer);

        loop {
            let reply = match self.reader.read_frame() {
                Ok(Some(frame)) => self.execute(frame),
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer);
                    return Ok(());
                }
                Err(KvError::UnexpectedEof) => {
                    tracing::debug!("Client {} disconnected mid-request", self.peer);
                    return Ok(());
                }
                Err(KvError::Protocol(msg)) => {
                    // the stream is still usable, only this frame is lost
                    tracing::debug!("Protocol error from {}: {}", self.peer, msg);
                    ReplyError::Protocol(msg).into()
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer, e);
                    return Err(e);
                }
            };

            if let Err(e) = write_frame(&mut self.writer, &reply) {
                if let KvError::Io(ref io_err) = e {
                    if io_err.kind() == std::io::ErrorKind::BrokenPipe {
                        tracing::debug!(
                            "Client {} disconnected before reply could be sent",
                            self.peer
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer, e);
                return Err(e);
            }
        }
    }

    fn execute(&mut self, frame: Frame) -> Frame {
        match frame.into_cmd_line() {
            Some(line) => {
                tracing::trace!("Received command from {}: {:?}", self.peer, line.first());
                self.engine.exec(&mut self.session, &line)
            }
            None => ReplyError::Protocol("expected an array of bulk strings".to_string()).into(),
        }
    }

    /// Get the peer name
    pub fn peer(&self) -> &str {
        &self.peer
    }
}
