//! Client
//!
//! Pipelined requests over one connection. Requests are written in call
//! order and replies come back in the same order, so each reply goes to the
//! oldest waiting request.

use std::collections::VecDeque;
use std::io::{BufReader, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::{KvError, Result};
use crate::protocol::{encode_command, Frame, FrameReader};

use super::pipe::{PipeReader, PipeWriter};

type Callback = Box<dyn FnOnce(Result<Frame>) + Send>;

/// Where a reply is delivered
enum Waiter {
    Channel(Sender<Result<Frame>>),
    Callback(Callback),
}

impl Waiter {
    fn deliver(self, reply: Result<Frame>) {
        match self {
            // the caller may have timed out and gone; its reply is discarded
            Waiter::Channel(sender) => {
                let _ = sender.send(reply);
            }
            Waiter::Callback(callback) => callback(reply),
        }
    }
}

struct Shared {
    /// `None` once the client is closed
    writer: Mutex<Option<BufWriter<PipeWriter>>>,

    waiters: Mutex<VecDeque<Waiter>>,

    /// Cleared when the reply stream ends
    alive: AtomicBool,
}

/// A client connection to an [`Endpoint`](super::Endpoint)
pub struct Client {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl Client {
    /// Wrap the client ends of a connection's two pipes
    pub fn new(writer: PipeWriter, reader: PipeReader, timeout: Duration) -> Result<Self> {
        let shared = Arc::new(Shared {
            writer: Mutex::new(Some(BufWriter::new(writer))),
            waiters: Mutex::new(VecDeque::new()),
            alive: AtomicBool::new(true),
        });
        let frames = FrameReader::new(BufReader::new(reader));
        let reader_shared = Arc::clone(&shared);
        let reader = thread::Builder::new()
            .name("client-reader".to_string())
            .spawn(move || read_replies(frames, reader_shared))?;

        Ok(Self {
            shared,
            reader: Mutex::new(Some(reader)),
            timeout,
        })
    }

    /// Send a command and wait for its reply.
    ///
    /// Gives up with [`KvError::Timeout`] after the configured timeout; the
    /// command still runs and its reply is discarded.
    pub fn send(&self, args: &[Bytes]) -> Result<Frame> {
        let (sender, receiver): (_, Receiver<Result<Frame>>) = bounded(1);
        self.dispatch(args, Waiter::Channel(sender))?;
        match receiver.recv_timeout(self.timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => Err(KvError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(KvError::Closed),
        }
    }

    /// Send a command; `callback` runs on the reader thread with the reply
    pub fn send_async(
        &self,
        args: &[Bytes],
        callback: impl FnOnce(Result<Frame>) + Send + 'static,
    ) -> Result<()> {
        self.dispatch(args, Waiter::Callback(Box::new(callback)))
    }

    fn dispatch(&self, args: &[Bytes], waiter: Waiter) -> Result<()> {
        // Holding the writer lock while queuing keeps queue order equal to
        // wire order.
        let mut writer = self.shared.writer.lock();
        let Some(out) = writer.as_mut() else {
            return Err(KvError::Closed);
        };
        {
            let mut waiters = self.shared.waiters.lock();
            if !self.shared.alive.load(Ordering::SeqCst) {
                return Err(KvError::Closed);
            }
            waiters.push_back(waiter);
        }
        let payload = encode_command(args);
        out.write_all(&payload)
            .and_then(|_| out.flush())
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::BrokenPipe => KvError::Closed,
                _ => KvError::Io(e),
            })
    }

    /// Requests still waiting for a reply
    pub fn in_flight(&self) -> usize {
        self.shared.waiters.lock().len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Close the connection and wait for the reader to finish.
    /// Calling it again is a no-op.
    pub fn close(&self) {
        drop(self.shared.writer.lock().take());
        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            if reader.join().is_err() {
                tracing::warn!("client reader thread panicked");
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_replies(mut frames: FrameReader<BufReader<PipeReader>>, shared: Arc<Shared>) {
    loop {
        let reply = match frames.read_frame() {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => break,
            Err(err @ KvError::Protocol(_)) => Err(err),
            Err(err) => {
                tracing::debug!("client reply stream failed: {}", err);
                break;
            }
        };
        let waiter = shared.waiters.lock().pop_front();
        match waiter {
            Some(waiter) => waiter.deliver(reply),
            None => tracing::debug!("discarding reply with no pending request"),
        }
    }

    let orphaned: Vec<Waiter> = {
        let mut waiters = shared.waiters.lock();
        shared.alive.store(false, Ordering::SeqCst);
        waiters.drain(..).collect()
    };
    for waiter in orphaned {
        waiter.deliver(Err(KvError::Closed));
    }
}
