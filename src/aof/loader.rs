//! AOF Replay
//!
//! Feeds every recorded command back through the engine, exactly as a client
//! request would run, before the engine starts serving.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::engine::Engine;
use crate::error::{KvError, Result};
use crate::protocol::{Frame, FrameReader};
use crate::session::ReplayConnection;

/// Result of a replay
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Commands executed successfully
    pub frames_replayed: u64,

    /// Malformed frames and commands that replied with an error
    pub frames_skipped: u64,

    /// Whether the file ended in the middle of a frame
    pub truncated: bool,

    /// Length of the leading part of the file made of whole frames
    pub valid_bytes: u64,
}

/// Counts the bytes the frame decoder has taken from `inner`
struct CountingReader<R> {
    inner: R,
    consumed: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, consumed: 0 }
    }

    fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.consumed += read as u64;
        Ok(read)
    }
}

impl<R: BufRead> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.consumed += amt as u64;
        self.inner.consume(amt);
    }
}

/// Replay the file at `path` into `engine`.
///
/// A missing file is an empty log. `max_bytes > 0` stops reading after that
/// many bytes. Replay stops at the first incomplete frame.
pub fn load(engine: &Engine, path: &Path, max_bytes: u64) -> Result<ReplayStats> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no AOF at {:?}, starting empty", path);
            return Ok(ReplayStats::default());
        }
        Err(err) => return Err(err.into()),
    };
    let source: Box<dyn Read> = if max_bytes > 0 {
        Box::new(file.take(max_bytes))
    } else {
        Box::new(file)
    };

    let mut stats = ReplayStats::default();
    let mut conn = ReplayConnection::new();
    let mut frames = FrameReader::new(CountingReader::new(BufReader::new(source)));
    while let Some(next) = frames.next() {
        let frame = match next {
            Ok(frame) => frame,
            Err(KvError::UnexpectedEof) => {
                tracing::warn!("AOF {:?} ends mid-frame, ignoring the tail", path);
                stats.truncated = true;
                break;
            }
            Err(KvError::Protocol(msg)) => {
                tracing::warn!("skipping malformed AOF frame: {}", msg);
                stats.frames_skipped += 1;
                stats.valid_bytes = frames.get_ref().consumed();
                continue;
            }
            Err(err) => return Err(err),
        };
        stats.valid_bytes = frames.get_ref().consumed();

        let Some(line) = frame.into_cmd_line() else {
            tracing::warn!("skipping AOF frame that is not a command");
            stats.frames_skipped += 1;
            continue;
        };
        match engine.exec(&mut conn, &line) {
            Frame::Error(msg) => {
                tracing::warn!("AOF command failed during replay: {}", msg);
                stats.frames_skipped += 1;
            }
            _ => stats.frames_replayed += 1,
        }
    }

    tracing::info!(
        "replayed {} AOF command(s) from {:?} ({} skipped{})",
        stats.frames_replayed,
        path,
        stats.frames_skipped,
        if stats.truncated { ", truncated" } else { "" }
    );
    Ok(stats)
}
