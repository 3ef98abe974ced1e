//! Frame definitions
//!
//! One closed enum covers both directions of the protocol.

use bytes::Bytes;

use super::codec::encode_frame;

/// A command name followed by its arguments, as received on the wire
pub type CmdLine = Vec<Bytes>;

/// Build a command line from string arguments
pub fn cmd_line(args: &[&str]) -> CmdLine {
    args.iter()
        .map(|arg| Bytes::copy_from_slice(arg.as_bytes()))
        .collect()
}

/// A single protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `+<text>\r\n`
    Status(String),

    /// `-<text>\r\n`
    Error(String),

    /// `:<n>\r\n`
    Integer(i64),

    /// `$<len>\r\n<data>\r\n`, `None` encodes as `$-1\r\n`
    Bulk(Option<Bytes>),

    /// `*<count>\r\n<elements>`, `None` encodes as `*-1\r\n`
    Array(Option<Vec<Frame>>),
}

impl Frame {
    pub fn ok() -> Self {
        Frame::Status("OK".to_string())
    }

    pub fn pong() -> Self {
        Frame::Status("PONG".to_string())
    }

    pub fn queued() -> Self {
        Frame::Status("QUEUED".to_string())
    }

    pub fn status(text: impl Into<String>) -> Self {
        Frame::Status(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Frame::Error(text.into())
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::Bulk(Some(data.into()))
    }

    pub fn null_bulk() -> Self {
        Frame::Bulk(None)
    }

    pub fn null_array() -> Self {
        Frame::Array(None)
    }

    pub fn empty_array() -> Self {
        Frame::Array(Some(Vec::new()))
    }

    /// An array whose elements are all bulk strings
    pub fn multi_bulk<I, B>(items: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Frame::Array(Some(items.into_iter().map(Frame::bulk).collect()))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = bytes::BytesMut::new();
        encode_frame(self, &mut buf);
        buf.freeze()
    }

    /// Interpret a request frame as a command line.
    ///
    /// Only non-empty arrays of non-null bulk strings qualify.
    pub fn into_cmd_line(self) -> Option<CmdLine> {
        let Frame::Array(Some(items)) = self else {
            return None;
        };
        if items.is_empty() {
            return None;
        }
        items
            .into_iter()
            .map(|item| match item {
                Frame::Bulk(Some(data)) => Some(data),
                _ => None,
            })
            .collect()
    }
}
