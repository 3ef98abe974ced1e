//! Endpoint
//!
//! Connection factory for an engine. Every connection gets its own handler
//! thread; closing the endpoint ends all of their request streams and waits
//! for the threads to exit.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::engine::Engine;
use crate::error::{KvError, Result};

use super::client::Client;
use super::connection::ConnectionHandler;
use super::pipe::pipe;

pub struct Endpoint {
    engine: Arc<Engine>,

    /// Never sent on; dropping it stops every handler
    stop: Mutex<Option<Sender<()>>>,
    stop_signal: Receiver<()>,

    workers: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Endpoint {
    pub fn new(engine: Arc<Engine>) -> Self {
        let (stop, stop_signal) = bounded(0);
        Self {
            engine,
            stop: Mutex::new(Some(stop)),
            stop_signal,
            workers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Open a new connection served by its own thread
    pub fn connect(&self) -> Result<Client> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KvError::Closed);
        }
        let config = self.engine.config();
        let (client_out, server_in) = pipe(config.pipe_capacity);
        let (server_out, client_in) = pipe(config.pipe_capacity);

        let peer = format!("conn-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handler = ConnectionHandler::new(
            server_in.with_shutdown(self.stop_signal.clone()),
            server_out,
            Arc::clone(&self.engine),
            peer.clone(),
        );
        let worker = thread::Builder::new().name(peer).spawn(move || {
            if let Err(e) = handler.handle() {
                tracing::warn!("Connection {} failed: {}", handler.peer(), e);
            }
        })?;

        {
            let mut workers = self.workers.lock();
            workers.retain(|worker| !worker.is_finished());
            workers.push(worker);
        }

        Client::new(
            client_out,
            client_in,
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    /// Stop every connection and wait for its handler to exit.
    /// Calling it again is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        drop(self.stop.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        let count = workers.len();
        for worker in workers {
            if worker.join().is_err() {
                tracing::warn!("connection handler thread panicked");
            }
        }
        tracing::info!("endpoint closed ({} connection thread(s) joined)", count);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}
