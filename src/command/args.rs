//! Argument parsing shared by handlers

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::datastruct::Element;
use crate::error::ReplyError;
use crate::protocol::{CmdLine, Frame};

/// Option or number text. Keys and members stay as raw bytes.
pub(crate) fn text(arg: &Bytes) -> String {
    String::from_utf8_lossy(arg).into_owned()
}

pub(crate) fn upper(arg: &Bytes) -> String {
    String::from_utf8_lossy(arg).to_ascii_uppercase()
}

pub(crate) fn parse_i64(arg: &Bytes) -> Result<i64, ReplyError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(ReplyError::not_integer)
}

pub(crate) fn parse_f64(arg: &Bytes) -> Result<f64, ReplyError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|value| !value.is_nan())
        .ok_or_else(ReplyError::not_float)
}

pub(crate) fn invalid_expire(command: &str) -> ReplyError {
    ReplyError::Argument(format!("invalid expire time in '{}' command", command))
}

/// Positive expiry option scaled to milliseconds by `unit_ms`
pub(crate) fn parse_expire_millis(
    arg: &Bytes,
    unit_ms: i64,
    command: &str,
) -> Result<i64, ReplyError> {
    let value = parse_i64(arg)?;
    if value <= 0 {
        return Err(invalid_expire(command));
    }
    value
        .checked_mul(unit_ms)
        .ok_or_else(|| invalid_expire(command))
}

/// `name` followed by `args`, as it should be written to the AOF
pub fn log_line(name: &str, args: &[Bytes]) -> CmdLine {
    let mut line = Vec::with_capacity(args.len() + 1);
    line.push(Bytes::copy_from_slice(name.as_bytes()));
    line.extend(args.iter().cloned());
    line
}

/// Milliseconds since the Unix epoch (negative before it), saturating
pub fn unix_millis(at: SystemTime) -> i64 {
    match at.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis())
            .map(|ms| -ms)
            .unwrap_or(i64::MIN),
    }
}

/// `PEXPIREAT key <unix-ms>`, the form every deadline is persisted in
pub(crate) fn pexpireat_line(key: &[u8], at: SystemTime) -> CmdLine {
    vec![
        Bytes::from_static(b"PEXPIREAT"),
        Bytes::copy_from_slice(key),
        Bytes::from(unix_millis(at).to_string()),
    ]
}

/// Every `i64` millisecond offset from the epoch is representable
pub(crate) fn from_unix_millis(ms: i64) -> SystemTime {
    if ms >= 0 {
        UNIX_EPOCH + Duration::from_millis(ms as u64)
    } else {
        UNIX_EPOCH - Duration::from_millis(ms.unsigned_abs())
    }
}

/// Deadline `delta_ms` from now, saturating; non-positive deltas land in the past
pub(crate) fn deadline_after(delta_ms: i64) -> SystemTime {
    from_unix_millis(unix_millis(SystemTime::now()).saturating_add(delta_ms))
}

/// Deadline `delta_ms` from now, or `None` when it does not fit in `i64` ms
pub(crate) fn checked_deadline_after(delta_ms: i64) -> Option<SystemTime> {
    unix_millis(SystemTime::now())
        .checked_add(delta_ms)
        .map(from_unix_millis)
}

pub(crate) fn format_score(score: f64) -> Bytes {
    Bytes::from(score.to_string())
}

/// Members, optionally interleaved with their scores
pub(crate) fn elements_reply(elements: &[Element], with_scores: bool) -> Frame {
    let mut items = Vec::with_capacity(if with_scores {
        elements.len() * 2
    } else {
        elements.len()
    });
    for element in elements {
        items.push(Frame::bulk(element.member.clone()));
        if with_scores {
            items.push(Frame::bulk(format_score(element.score)));
        }
    }
    Frame::Array(Some(items))
}
