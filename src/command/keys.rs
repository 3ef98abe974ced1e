//! Key and string commands

use std::time::SystemTime;

use bytes::Bytes;

use super::args::{
    checked_deadline_after, deadline_after, from_unix_millis, invalid_expire, log_line,
    parse_expire_millis, parse_i64, pexpireat_line, upper,
};
use super::undo::{rollback_first_key, rollback_given_keys};
use super::{
    no_prepare, read_all_keys, read_first_key, write_all_keys, write_first_key, CommandFlag,
    CommandTable,
};
use crate::database::{DataEntity, Db};
use crate::error::ReplyError;
use crate::protocol::{CmdLine, Frame};

pub(super) fn register(table: &mut CommandTable) {
    use CommandFlag::{ReadOnly, Write};

    table.register("ping", exec_ping, no_prepare, None, -1, ReadOnly);
    table.register("get", exec_get, read_first_key, None, 2, ReadOnly);
    table.register("set", exec_set, write_first_key, Some(rollback_first_key), -3, Write);
    table.register("getex", exec_getex, write_first_key, Some(rollback_first_key), -2, Write);
    table.register("del", exec_del, write_all_keys, Some(undo_del), -2, Write);
    table.register("exists", exec_exists, read_all_keys, None, -2, ReadOnly);
    table.register("type", exec_type, read_first_key, None, 2, ReadOnly);
    table.register("expire", exec_expire, write_first_key, Some(rollback_first_key), 3, Write);
    table.register("expireat", exec_expireat, write_first_key, Some(rollback_first_key), 3, Write);
    table.register("pexpire", exec_pexpire, write_first_key, Some(rollback_first_key), 3, Write);
    table.register("pexpireat", exec_pexpireat, write_first_key, Some(rollback_first_key), 3, Write);
    table.register("ttl", exec_ttl, read_first_key, None, 2, ReadOnly);
    table.register("pttl", exec_pttl, read_first_key, None, 2, ReadOnly);
    table.register("persist", exec_persist, write_first_key, Some(rollback_first_key), 2, Write);
    table.register("randomkey", exec_randomkey, no_prepare, None, 1, ReadOnly);
    table.register("dbsize", exec_dbsize, no_prepare, None, 1, ReadOnly);
}

fn undo_del(db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    rollback_given_keys(db, args)
}

// =============================================================================
// Strings
// =============================================================================

fn exec_ping(_db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    match args {
        [] => Ok(Frame::pong()),
        [message] => Ok(Frame::bulk(message.clone())),
        _ => Err(ReplyError::wrong_arity("ping")),
    }
}

fn exec_get(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let value = db
        .with_entity(&args[0], |entity| entity.as_bytes().cloned())
        .transpose()?;
    Ok(match value {
        Some(value) => Frame::bulk(value),
        None => Frame::null_bulk(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetPolicy {
    Upsert,
    InsertOnly,
    UpdateOnly,
}

/// SET key value [NX|XX] [EX seconds|PX milliseconds]
fn exec_set(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let mut policy = SetPolicy::Upsert;
    let mut ttl_ms: Option<i64> = None;

    let mut i = 2;
    while i < args.len() {
        match upper(&args[i]).as_str() {
            "NX" => {
                if policy == SetPolicy::UpdateOnly {
                    return Err(ReplyError::syntax());
                }
                policy = SetPolicy::InsertOnly;
            }
            "XX" => {
                if policy == SetPolicy::InsertOnly {
                    return Err(ReplyError::syntax());
                }
                policy = SetPolicy::UpdateOnly;
            }
            option @ ("EX" | "PX") => {
                if ttl_ms.is_some() || i + 1 >= args.len() {
                    return Err(ReplyError::syntax());
                }
                let unit_ms = if option == "EX" { 1000 } else { 1 };
                ttl_ms = Some(parse_expire_millis(&args[i + 1], unit_ms, "set")?);
                i += 1;
            }
            _ => return Err(ReplyError::syntax()),
        }
        i += 1;
    }

    // resolved before anything is stored
    let deadline = match ttl_ms {
        Some(ms) => Some(checked_deadline_after(ms).ok_or_else(|| invalid_expire("set"))?),
        None => None,
    };

    let entity = DataEntity::Bytes(args[1].clone());
    let stored = match policy {
        SetPolicy::Upsert => {
            db.put_entity(key, entity);
            true
        }
        SetPolicy::InsertOnly => db.put_if_absent(key, entity),
        SetPolicy::UpdateOnly => db.put_if_exists(key, entity),
    };
    if !stored {
        return Ok(Frame::null_bulk());
    }

    db.persist(key);
    db.add_aof(log_line("SET", &args[..2]));
    if let Some(at) = deadline {
        db.expire(key, at);
        db.add_aof(pexpireat_line(key, at));
    }
    Ok(Frame::ok())
}

enum ExpiryChange {
    Keep,
    At(SystemTime),
    Persist,
}

/// GETEX key [EX seconds|PX milliseconds|EXAT unix-s|PXAT unix-ms|PERSIST]
fn exec_getex(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let mut change = ExpiryChange::Keep;

    let mut i = 1;
    while i < args.len() {
        if !matches!(change, ExpiryChange::Keep) {
            return Err(ReplyError::syntax());
        }
        let option = upper(&args[i]);
        if option == "PERSIST" {
            change = ExpiryChange::Persist;
            i += 1;
            continue;
        }
        let Some(amount) = args.get(i + 1) else {
            return Err(ReplyError::syntax());
        };
        let at = match option.as_str() {
            "EX" | "PX" => {
                let unit_ms = if option == "EX" { 1000 } else { 1 };
                let ms = parse_expire_millis(amount, unit_ms, "getex")?;
                checked_deadline_after(ms).ok_or_else(|| invalid_expire("getex"))?
            }
            "EXAT" => from_unix_millis(parse_expire_millis(amount, 1000, "getex")?),
            "PXAT" => from_unix_millis(parse_expire_millis(amount, 1, "getex")?),
            _ => return Err(ReplyError::syntax()),
        };
        change = ExpiryChange::At(at);
        i += 2;
    }

    let value = db
        .with_entity(key, |entity| entity.as_bytes().cloned())
        .transpose()?;
    let Some(value) = value else {
        return Ok(Frame::null_bulk());
    };

    match change {
        ExpiryChange::Keep => {}
        ExpiryChange::At(at) => {
            db.expire(key, at);
            db.add_aof(pexpireat_line(key, at));
        }
        ExpiryChange::Persist => {
            if db.persist(key) {
                db.add_aof(log_line("PERSIST", &args[..1]));
            }
        }
    }
    Ok(Frame::bulk(value))
}

// =============================================================================
// Keyspace
// =============================================================================

fn exec_del(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let deleted = db.removes(args);
    if deleted > 0 {
        db.add_aof(log_line("DEL", args));
    }
    Ok(Frame::Integer(deleted as i64))
}

fn exec_exists(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let found = args.iter().filter(|key| db.exists(key)).count();
    Ok(Frame::Integer(found as i64))
}

fn exec_type(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let name = db.with_entity(&args[0], DataEntity::type_name).unwrap_or("none");
    Ok(Frame::status(name))
}

fn exec_randomkey(db: &Db, _args: &[Bytes]) -> Result<Frame, ReplyError> {
    let live = db
        .random_keys(1)
        .into_iter()
        .find(|key| db.exists(key))
        .or_else(|| db.keys().into_iter().find(|key| db.exists(key)));
    Ok(match live {
        Some(key) => Frame::bulk(key),
        None => Frame::null_bulk(),
    })
}

/// Number of stored keys, counting expired keys not yet collected
fn exec_dbsize(db: &Db, _args: &[Bytes]) -> Result<Frame, ReplyError> {
    Ok(Frame::Integer(db.len() as i64))
}

// =============================================================================
// Expiry
// =============================================================================

/// Set an absolute deadline and log it as PEXPIREAT
fn expire_at(db: &Db, key: &[u8], at: SystemTime) -> Frame {
    if !db.exists(key) {
        return Frame::Integer(0);
    }
    db.expire(key, at);
    db.add_aof(pexpireat_line(key, at));
    Frame::Integer(1)
}

fn exec_expire(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let seconds = parse_i64(&args[1])?;
    let at = deadline_after(seconds.saturating_mul(1000));
    Ok(expire_at(db, &args[0], at))
}

fn exec_expireat(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let seconds = parse_i64(&args[1])?;
    let at = from_unix_millis(seconds.saturating_mul(1000));
    Ok(expire_at(db, &args[0], at))
}

fn exec_pexpire(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let millis = parse_i64(&args[1])?;
    Ok(expire_at(db, &args[0], deadline_after(millis)))
}

fn exec_pexpireat(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let millis = parse_i64(&args[1])?;
    Ok(expire_at(db, &args[0], from_unix_millis(millis)))
}

/// Remaining time in milliseconds, -2 for a missing key, -1 without deadline
fn remaining_millis(db: &Db, key: &[u8]) -> i64 {
    if !db.exists(key) {
        return -2;
    }
    match db.ttl_of(key) {
        Some(at) => at
            .duration_since(SystemTime::now())
            .map(|left| left.as_millis() as i64)
            .unwrap_or(0),
        None => -1,
    }
}

fn exec_ttl(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let millis = remaining_millis(db, &args[0]);
    Ok(Frame::Integer(if millis < 0 {
        millis
    } else {
        (millis + 500) / 1000
    }))
}

fn exec_pttl(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    Ok(Frame::Integer(remaining_millis(db, &args[0])))
}

fn exec_persist(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let key = &args[0];
    if !db.exists(key) {
        return Ok(Frame::Integer(0));
    }
    if !db.persist(key) {
        return Ok(Frame::Integer(0));
    }
    db.add_aof(log_line("PERSIST", args));
    Ok(Frame::Integer(1))
}
