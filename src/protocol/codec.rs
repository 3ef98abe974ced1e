//! Protocol codec
//!
//! Encoding functions and a streaming decoder for the wire protocol.
//!
//! ## Decoding
//! [`FrameReader`] pulls one frame at a time from any `BufRead`. Bulk payloads
//! are read by their declared length, so nothing beyond the current frame is
//! buffered. A malformed frame yields `KvError::Protocol` and the reader keeps
//! going; running out of input in the middle of a frame yields
//! `KvError::UnexpectedEof` and ends the sequence.

use std::io::{BufRead, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{KvError, Result};
use super::Frame;

/// Maximum bulk payload size (512 MB)
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Maximum element count of a single array
const MAX_ARRAY_LEN: i64 = 1024 * 1024;

/// Maximum length of a header or status line
const MAX_LINE_LEN: usize = 64 * 1024;

// =============================================================================
// Encoding
// =============================================================================

/// Append the wire form of `frame` to `buf`
pub fn encode_frame(frame: &Frame, buf: &mut BytesMut) {
    match frame {
        Frame::Status(text) => put_text_line(buf, b'+', text),
        Frame::Error(text) => put_text_line(buf, b'-', text),
        Frame::Integer(n) => put_line(buf, b':', n.to_string().as_bytes()),
        Frame::Bulk(None) => buf.put_slice(b"$-1\r\n"),
        Frame::Bulk(Some(data)) => {
            put_line(buf, b'$', data.len().to_string().as_bytes());
            buf.put_slice(data);
            buf.put_slice(b"\r\n");
        }
        Frame::Array(None) => buf.put_slice(b"*-1\r\n"),
        Frame::Array(Some(items)) => {
            put_line(buf, b'*', items.len().to_string().as_bytes());
            for item in items {
                encode_frame(item, buf);
            }
        }
    }
}

/// Encode a command line as an array of bulk strings
pub fn encode_command(line: &[Bytes]) -> Bytes {
    let mut buf = BytesMut::new();
    put_line(&mut buf, b'*', line.len().to_string().as_bytes());
    for arg in line {
        put_line(&mut buf, b'$', arg.len().to_string().as_bytes());
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }
    buf.freeze()
}

/// Write a frame to a stream and flush it
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    writer.write_all(&frame.to_bytes())?;
    writer.flush()?;
    Ok(())
}

fn put_line(buf: &mut BytesMut, prefix: u8, body: &[u8]) {
    buf.reserve(body.len() + 3);
    buf.put_u8(prefix);
    buf.put_slice(body);
    buf.put_slice(b"\r\n");
}

/// Status and error lines cannot carry CR or LF; each becomes a space.
fn put_text_line(buf: &mut BytesMut, prefix: u8, text: &str) {
    buf.reserve(text.len() + 3);
    buf.put_u8(prefix);
    buf.extend(text.bytes().map(|b| if b == b'\r' || b == b'\n' { b' ' } else { b }));
    buf.put_slice(b"\r\n");
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode exactly one frame from a complete buffer
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    FrameReader::new(bytes)
        .read_frame()?
        .ok_or(KvError::UnexpectedEof)
}

/// Streaming frame decoder
///
/// As an iterator it yields every frame or per-frame protocol error, and
/// stops after the input ends (cleanly or not).
pub struct FrameReader<R> {
    reader: R,
    finished: bool,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            finished: false,
        }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the input ends on a frame boundary.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        match self.read_line()? {
            Some(line) => self.parse_line(line).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let limit = MAX_LINE_LEN as u64 + 1;
        let read = map_eof((&mut self.reader).take(limit).read_until(b'\n', &mut line))?;
        if read == 0 {
            return Ok(None);
        }
        if line.len() > MAX_LINE_LEN {
            if !line.ends_with(b"\n") {
                self.skip_line()?;
            }
            return Err(KvError::Protocol("line too long".to_string()));
        }
        if !line.ends_with(b"\n") {
            return Err(KvError::UnexpectedEof);
        }
        if !line.ends_with(b"\r\n") {
            return Err(KvError::Protocol("line is not terminated by CRLF".to_string()));
        }
        line.truncate(line.len() - 2);
        Ok(Some(line))
    }

    /// Drop input up to and including the next LF
    fn skip_line(&mut self) -> Result<()> {
        loop {
            let (newline, available) = {
                let buf = map_eof(self.reader.fill_buf())?;
                (buf.iter().position(|&b| b == b'\n'), buf.len())
            };
            match newline {
                Some(at) => {
                    self.reader.consume(at + 1);
                    return Ok(());
                }
                None if available == 0 => return Ok(()),
                None => self.reader.consume(available),
            }
        }
    }

    fn parse_line(&mut self, line: Vec<u8>) -> Result<Frame> {
        let Some((&prefix, body)) = line.split_first() else {
            return Err(KvError::Protocol("empty line".to_string()));
        };
        match prefix {
            b'+' => Ok(Frame::Status(String::from_utf8_lossy(body).into_owned())),
            b'-' => Ok(Frame::Error(String::from_utf8_lossy(body).into_owned())),
            b':' => parse_int(body).map(Frame::Integer),
            b'$' => {
                let len = parse_int(body)?;
                self.read_bulk(len)
            }
            b'*' => {
                let count = parse_int(body)?;
                self.read_array(count)
            }
            other => Err(KvError::Protocol(format!(
                "illegal frame prefix '{}'",
                other.escape_ascii()
            ))),
        }
    }

    fn read_bulk(&mut self, len: i64) -> Result<Frame> {
        if len == -1 {
            return Ok(Frame::Bulk(None));
        }
        if !(0..=MAX_BULK_LEN).contains(&len) {
            return Err(KvError::Protocol(format!("invalid bulk length {}", len)));
        }

        // Declared length plus CRLF; grows as data arrives rather than up front.
        let expected = len as u64 + 2;
        let mut body = Vec::new();
        let read = map_eof((&mut self.reader).take(expected).read_to_end(&mut body))?;
        if (read as u64) < expected {
            return Err(KvError::UnexpectedEof);
        }
        if !body.ends_with(b"\r\n") {
            return Err(KvError::Protocol(
                "bulk string is not terminated by CRLF".to_string(),
            ));
        }
        body.truncate(len as usize);
        Ok(Frame::Bulk(Some(Bytes::from(body))))
    }

    fn read_array(&mut self, count: i64) -> Result<Frame> {
        if count == -1 {
            return Ok(Frame::Array(None));
        }
        if !(0..=MAX_ARRAY_LEN).contains(&count) {
            return Err(KvError::Protocol(format!("invalid array length {}", count)));
        }
        let mut items = Vec::with_capacity((count as usize).min(64));
        for _ in 0..count {
            let Some(line) = self.read_line()? else {
                return Err(KvError::UnexpectedEof);
            };
            items.push(self.parse_line(line)?);
        }
        Ok(Frame::Array(Some(items)))
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                if err.is_fatal() {
                    self.finished = true;
                }
                Some(Err(err))
            }
        }
    }
}

fn parse_int(body: &[u8]) -> Result<i64> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| {
            KvError::Protocol(format!("invalid integer '{}'", body.escape_ascii()))
        })
}

fn map_eof<T>(result: std::io::Result<T>) -> Result<T> {
    result.map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => KvError::UnexpectedEof,
        _ => KvError::Io(err),
    })
}
