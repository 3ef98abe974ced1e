//! Byte Pipe
//!
//! A one-directional byte stream between threads, built on a bounded channel
//! of chunks. The writer blocks when `capacity` chunks are in flight.

use std::io::{self, Read, Write};

use bytes::{Buf, Bytes};
use crossbeam::channel::{bounded, Receiver, Sender};

/// Create a connected writer/reader pair
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (sender, receiver) = bounded(capacity.max(1));
    (
        PipeWriter { sender },
        PipeReader {
            receiver,
            pending: Bytes::new(),
            shutdown: None,
        },
    )
}

/// Sending half. Dropping it ends the stream for the reader.
#[derive(Debug)]
pub struct PipeWriter {
    sender: Sender<Bytes>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.sender
            .send(Bytes::copy_from_slice(buf))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Receiving half. Reports end of stream once every writer is gone.
#[derive(Debug)]
pub struct PipeReader {
    receiver: Receiver<Bytes>,

    /// Rest of the chunk a previous `read` did not fit
    pending: Bytes,

    /// Disconnecting this channel ends the stream early
    shutdown: Option<Receiver<()>>,
}

impl PipeReader {
    /// End the stream as soon as every sender of `shutdown` is dropped
    pub fn with_shutdown(mut self, shutdown: Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn next_chunk(&self) -> Option<Bytes> {
        match &self.shutdown {
            Some(shutdown) => crossbeam::channel::select! {
                recv(self.receiver) -> chunk => chunk.ok(),
                recv(shutdown) -> _ => None,
            },
            None => self.receiver.recv().ok(),
        }
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() {
            match self.next_chunk() {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}
