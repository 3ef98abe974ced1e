//! List commands
//!
//! A list drained to zero elements removes its key.

use bytes::Bytes;

use super::args::{log_line, parse_i64};
use super::undo::rollback_first_key;
use super::{read_first_key, write_first_key, write_first_two_keys, CommandFlag, CommandTable};
use crate::database::Db;
use crate::datastruct::{normalize_range, LinkedList};
use crate::error::ReplyError;
use crate::protocol::{CmdLine, Frame};

pub(super) fn register(table: &mut CommandTable) {
    use CommandFlag::{ReadOnly, Write};

    table.register("lpush", exec_lpush, write_first_key, Some(undo_lpush), -3, Write);
    table.register("lpushx", exec_lpushx, write_first_key, Some(undo_lpush), -3, Write);
    table.register("rpush", exec_rpush, write_first_key, Some(undo_rpush), -3, Write);
    table.register("rpushx", exec_rpushx, write_first_key, Some(undo_rpush), -3, Write);
    table.register("lpop", exec_lpop, write_first_key, Some(undo_lpop), 2, Write);
    table.register("rpop", exec_rpop, write_first_key, Some(undo_rpop), 2, Write);
    table.register(
        "rpoplpush",
        exec_rpoplpush,
        write_first_two_keys,
        Some(undo_rpoplpush),
        3,
        Write,
    );
    table.register("lrem", exec_lrem, write_first_key, Some(rollback_first_key), 4, Write);
    table.register("lset", exec_lset, write_first_key, Some(undo_lset), 4, Write);
    table.register("llen", exec_llen, read_first_key, None, 2, ReadOnly);
    table.register("lindex", exec_lindex, read_first_key, None, 3, ReadOnly);
    table.register("lrange", exec_lrange, read_first_key, None, 4, ReadOnly);
}

/// Position of a possibly negative `index` in a list of `len` elements
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        Some(index as usize)
    } else {
        None
    }
}

fn command_line(name: &'static str, args: &[&Bytes]) -> CmdLine {
    let mut line = Vec::with_capacity(args.len() + 1);
    line.push(Bytes::from_static(name.as_bytes()));
    line.extend(args.iter().map(|arg| (*arg).clone()));
    line
}

// =============================================================================
// Push
// =============================================================================

fn push(db: &Db, args: &[Bytes], front: bool, only_existing: bool, name: &str) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let values = &args[1..];
    let fill = |list: &mut LinkedList<Bytes>| {
        for value in values {
            if front {
                list.push_front(value.clone());
            } else {
                list.push_back(value.clone());
            }
        }
        list.len()
    };
    let len = if only_existing {
        match db.with_list_mut(key, fill)? {
            Some(len) => len,
            None => return Ok(Frame::Integer(0)),
        }
    } else {
        db.with_list_or_init(key, fill)?
    };
    db.add_aof(log_line(name, args));
    Ok(Frame::Integer(len as i64))
}

fn exec_lpush(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    push(db, args, true, false, "LPUSH")
}

fn exec_lpushx(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    push(db, args, true, true, "LPUSHX")
}

fn exec_rpush(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    push(db, args, false, false, "RPUSH")
}

fn exec_rpushx(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    push(db, args, false, true, "RPUSHX")
}

fn undo_lpush(_db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    let count = args.len().saturating_sub(1);
    (0..count).map(|_| command_line("LPOP", &[&args[0]])).collect()
}

fn undo_rpush(_db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    let count = args.len().saturating_sub(1);
    (0..count).map(|_| command_line("RPOP", &[&args[0]])).collect()
}

// =============================================================================
// Pop
// =============================================================================

fn pop(db: &Db, args: &[Bytes], front: bool, name: &str) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let popped = db
        .with_list_mut(key, |list| {
            if front {
                list.remove_first()
            } else {
                list.remove_last()
            }
        })?
        .flatten();
    let Some(value) = popped else {
        return Ok(Frame::null_bulk());
    };
    db.remove_if_empty(key);
    db.add_aof(log_line(name, args));
    Ok(Frame::bulk(value))
}

fn exec_lpop(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    pop(db, args, true, "LPOP")
}

fn exec_rpop(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    pop(db, args, false, "RPOP")
}

fn undo_lpop(db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    match db.with_list(&args[0], |list| list.first().cloned()) {
        Ok(Some(Some(head))) => vec![command_line("LPUSH", &[&args[0], &head])],
        _ => Vec::new(),
    }
}

fn undo_rpop(db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    match db.with_list(&args[0], |list| list.last().cloned()) {
        Ok(Some(Some(tail))) => vec![command_line("RPUSH", &[&args[0], &tail])],
        _ => Vec::new(),
    }
}

/// RPOPLPUSH source destination
fn exec_rpoplpush(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let source = &args[0];
    let destination = &args[1];

    // fail before popping when the destination cannot take the element
    db.with_entity(destination, |entity| entity.as_list().map(|_| ()))
        .transpose()?;

    let popped = db.with_list_mut(source, LinkedList::remove_last)?.flatten();
    let Some(value) = popped else {
        return Ok(Frame::null_bulk());
    };
    db.remove_if_empty(source);
    db.with_list_or_init(destination, |list| list.push_front(value.clone()))?;
    db.add_aof(log_line("RPOPLPUSH", args));
    Ok(Frame::bulk(value))
}

fn undo_rpoplpush(db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    match db.with_list(&args[0], |list| list.last().cloned()) {
        Ok(Some(Some(tail))) => vec![
            command_line("RPUSH", &[&args[0], &tail]),
            command_line("LPOP", &[&args[1]]),
        ],
        _ => Vec::new(),
    }
}

// =============================================================================
// Update
// =============================================================================

/// LREM key count value
fn exec_lrem(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let count = parse_i64(&args[1])?;
    let target = &args[2];
    let matches = |value: &Bytes| value == target;

    let removed = db
        .with_list_mut(key, |list| {
            if count == 0 {
                list.remove_all_by_val(matches)
            } else if count > 0 {
                list.remove_by_val(matches, count as usize)
            } else {
                list.reverse_remove_by_val(matches, count.unsigned_abs() as usize)
            }
        })?
        .unwrap_or(0);
    if removed > 0 {
        db.remove_if_empty(key);
        db.add_aof(log_line("LREM", args));
    }
    Ok(Frame::Integer(removed as i64))
}

/// LSET key index value
fn exec_lset(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let index = parse_i64(&args[1])?;
    let value = args[2].clone();

    let outcome = db.with_list_mut(key, |list| {
        let position = resolve_index(index, list.len())?;
        list.set(position, value).ok()
    })?;
    match outcome {
        None => Err(ReplyError::Argument("no such key".to_string())),
        Some(None) => Err(ReplyError::Argument("index out of range".to_string())),
        Some(Some(_old)) => {
            db.add_aof(log_line("LSET", args));
            Ok(Frame::ok())
        }
    }
}

fn undo_lset(db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    let Ok(index) = parse_i64(&args[1]) else {
        return Vec::new();
    };
    let old = db.with_list(&args[0], |list| {
        let position = resolve_index(index, list.len())?;
        list.get(position).ok().cloned()
    });
    match old {
        Ok(Some(Some(old))) => vec![command_line("LSET", &[&args[0], &args[1], &old])],
        _ => Vec::new(),
    }
}

// =============================================================================
// Read
// =============================================================================

fn exec_llen(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let len = db.with_list(&args[0], LinkedList::len)?.unwrap_or(0);
    Ok(Frame::Integer(len as i64))
}

/// LINDEX key index; out-of-range indices give a null bulk
fn exec_lindex(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let index = parse_i64(&args[1])?;
    let value = db
        .with_list(&args[0], |list| {
            let position = resolve_index(index, list.len())?;
            list.get(position).ok().cloned()
        })?
        .flatten();
    Ok(match value {
        Some(value) => Frame::bulk(value),
        None => Frame::null_bulk(),
    })
}

/// LRANGE key start stop, both inclusive
fn exec_lrange(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let start = parse_i64(&args[1])?;
    let stop = parse_i64(&args[2])?;
    let values = db.with_list(&args[0], |list| {
        match normalize_range(start, stop, list.len()) {
            Some((from, to)) => list.range(from, to),
            None => Ok(Vec::new()),
        }
    })?;
    match values {
        None => Ok(Frame::empty_array()),
        Some(Ok(values)) => Ok(Frame::multi_bulk(values)),
        Some(Err(err)) => Err(ReplyError::from(&err)),
    }
}
