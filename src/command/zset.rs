//! Sorted set commands
//!
//! Scores are rendered with the shortest decimal form that parses back to the
//! same value. A set left empty by a removal removes its key.

use bytes::Bytes;

use super::args::{elements_reply, format_score, log_line, parse_f64, parse_i64, text, upper};
use super::undo::{rollback_first_key, rollback_zset_fields};
use super::{read_first_key, write_first_key, CommandFlag, CommandTable};
use crate::database::Db;
use crate::datastruct::{normalize_range, ScoreBorder, SortedSet};
use crate::error::ReplyError;
use crate::protocol::{CmdLine, Frame};

pub(super) fn register(table: &mut CommandTable) {
    use CommandFlag::{ReadOnly, Write};

    table.register("zadd", exec_zadd, write_first_key, Some(undo_zadd), -4, Write);
    table.register("zscore", exec_zscore, read_first_key, None, 3, ReadOnly);
    table.register("zincrby", exec_zincrby, write_first_key, Some(undo_zincrby), 4, Write);
    table.register("zrank", exec_zrank, read_first_key, None, 3, ReadOnly);
    table.register("zrevrank", exec_zrevrank, read_first_key, None, 3, ReadOnly);
    table.register("zcard", exec_zcard, read_first_key, None, 2, ReadOnly);
    table.register("zcount", exec_zcount, read_first_key, None, 4, ReadOnly);
    table.register("zrange", exec_zrange, read_first_key, None, -4, ReadOnly);
    table.register("zrevrange", exec_zrevrange, read_first_key, None, -4, ReadOnly);
    table.register("zrangebyscore", exec_zrangebyscore, read_first_key, None, -4, ReadOnly);
    table.register(
        "zrevrangebyscore",
        exec_zrevrangebyscore,
        read_first_key,
        None,
        -4,
        ReadOnly,
    );
    table.register("zpopmin", exec_zpopmin, write_first_key, Some(rollback_first_key), -2, Write);
    table.register("zpopmax", exec_zpopmax, write_first_key, Some(rollback_first_key), -2, Write);
    table.register("zrem", exec_zrem, write_first_key, Some(undo_zrem), -3, Write);
    table.register(
        "zremrangebyscore",
        exec_zremrangebyscore,
        write_first_key,
        Some(rollback_first_key),
        4,
        Write,
    );
    table.register(
        "zremrangebyrank",
        exec_zremrangebyrank,
        write_first_key,
        Some(rollback_first_key),
        4,
        Write,
    );
}

fn parse_border(arg: &Bytes) -> Result<ScoreBorder, ReplyError> {
    ScoreBorder::parse(&text(arg))
}

// =============================================================================
// Writes
// =============================================================================

/// ZADD key score member [score member ...]
fn exec_zadd(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    if args.len() % 2 != 1 {
        return Err(ReplyError::syntax());
    }
    let key = &args[0];
    let mut pairs = Vec::with_capacity(args.len() / 2);
    for pair in args[1..].chunks(2) {
        pairs.push((parse_f64(&pair[0])?, &pair[1]));
    }

    let added = db.with_zset_or_init(key, |set| {
        let mut added = 0;
        for &(score, member) in &pairs {
            if set.add(member, score) {
                added += 1;
            }
        }
        added
    })?;
    db.add_aof(log_line("ZADD", args));
    Ok(Frame::Integer(added as i64))
}

fn undo_zadd(db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    let members: Vec<Bytes> = args.iter().skip(2).step_by(2).cloned().collect();
    rollback_zset_fields(db, &args[0], &members)
}

/// ZINCRBY key increment member
fn exec_zincrby(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let increment = parse_f64(&args[1])?;
    let member = &args[2];

    let score = db.with_zset_or_init(key, |set| {
        let score = set.get(member).unwrap_or(0.0) + increment;
        if score.is_nan() {
            return None;
        }
        set.add(member, score);
        Some(score)
    })?;
    let Some(score) = score else {
        db.remove_if_empty(key);
        return Err(ReplyError::Argument(
            "resulting score is not a number (NaN)".to_string(),
        ));
    };
    db.add_aof(log_line("ZINCRBY", args));
    Ok(Frame::bulk(format_score(score)))
}

fn undo_zincrby(db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    rollback_zset_fields(db, &args[0], &args[2..3])
}

/// ZREM key member [member ...]
fn exec_zrem(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let removed = db
        .with_zset_mut(key, |set| args[1..].iter().filter(|member| set.remove(member)).count())?
        .unwrap_or(0);
    if removed > 0 {
        db.remove_if_empty(key);
        db.add_aof(log_line("ZREM", args));
    }
    Ok(Frame::Integer(removed as i64))
}

fn undo_zrem(db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    rollback_zset_fields(db, &args[0], &args[1..])
}

fn exec_zremrangebyscore(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let min = parse_border(&args[1])?;
    let max = parse_border(&args[2])?;
    let removed = db
        .with_zset_mut(key, |set| set.remove_by_score(&min, &max))?
        .unwrap_or(0);
    if removed > 0 {
        db.remove_if_empty(key);
        db.add_aof(log_line("ZREMRANGEBYSCORE", args));
    }
    Ok(Frame::Integer(removed as i64))
}

fn exec_zremrangebyrank(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let start = parse_i64(&args[1])?;
    let stop = parse_i64(&args[2])?;
    let removed = db
        .with_zset_mut(key, |set| match normalize_range(start, stop, set.len()) {
            Some((from, to)) => set.remove_by_rank(from, to),
            None => 0,
        })?
        .unwrap_or(0);
    if removed > 0 {
        db.remove_if_empty(key);
        db.add_aof(log_line("ZREMRANGEBYRANK", args));
    }
    Ok(Frame::Integer(removed as i64))
}

/// ZPOPMIN / ZPOPMAX key [count]
fn pop(db: &Db, args: &[Bytes], max: bool, name: &str) -> Result<Frame, ReplyError> {
    let key = &args[0];
    let count = match args {
        [_] => 1,
        [_, count] => {
            let count = parse_i64(count)?;
            if count < 0 {
                return Err(ReplyError::Argument(
                    "value is out of range, must be positive".to_string(),
                ));
            }
            count as usize
        }
        _ => return Err(ReplyError::syntax()),
    };

    let popped = db
        .with_zset_mut(key, |set| {
            if max {
                set.pop_max(count)
            } else {
                set.pop_min(count)
            }
        })?
        .unwrap_or_default();
    if !popped.is_empty() {
        db.remove_if_empty(key);
        db.add_aof(log_line(name, args));
    }
    Ok(elements_reply(&popped, true))
}

fn exec_zpopmin(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    pop(db, args, false, "ZPOPMIN")
}

fn exec_zpopmax(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    pop(db, args, true, "ZPOPMAX")
}

// =============================================================================
// Reads
// =============================================================================

fn exec_zscore(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let member = &args[1];
    let score = db.with_zset(&args[0], |set| set.get(member))?.flatten();
    Ok(match score {
        Some(score) => Frame::bulk(format_score(score)),
        None => Frame::null_bulk(),
    })
}

fn rank(db: &Db, args: &[Bytes], desc: bool) -> Result<Frame, ReplyError> {
    let member = &args[1];
    let rank = db
        .with_zset(&args[0], |set| set.get_rank(member, desc))?
        .flatten();
    Ok(match rank {
        Some(rank) => Frame::Integer(rank as i64),
        None => Frame::null_bulk(),
    })
}

fn exec_zrank(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    rank(db, args, false)
}

fn exec_zrevrank(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    rank(db, args, true)
}

fn exec_zcard(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let len = db.with_zset(&args[0], SortedSet::len)?.unwrap_or(0);
    Ok(Frame::Integer(len as i64))
}

fn exec_zcount(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    let min = parse_border(&args[1])?;
    let max = parse_border(&args[2])?;
    let count = db
        .with_zset(&args[0], |set| set.count(&min, &max))?
        .unwrap_or(0);
    Ok(Frame::Integer(count as i64))
}

/// ZRANGE / ZREVRANGE key start stop [WITHSCORES]
fn range(db: &Db, args: &[Bytes], desc: bool) -> Result<Frame, ReplyError> {
    let with_scores = match args.get(3) {
        None => false,
        Some(option) if args.len() == 4 && upper(option) == "WITHSCORES" => true,
        Some(_) => return Err(ReplyError::syntax()),
    };
    let start = parse_i64(&args[1])?;
    let stop = parse_i64(&args[2])?;

    let elements = db.with_zset(&args[0], |set| {
        match normalize_range(start, stop, set.len()) {
            Some((from, to)) => set.range(from, to, desc),
            None => Ok(Vec::new()),
        }
    })?;
    match elements {
        None => Ok(Frame::empty_array()),
        Some(Ok(elements)) => Ok(elements_reply(&elements, with_scores)),
        Some(Err(err)) => Err(ReplyError::from(&err)),
    }
}

fn exec_zrange(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    range(db, args, false)
}

fn exec_zrevrange(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    range(db, args, true)
}

/// ZRANGEBYSCORE key min max / ZREVRANGEBYSCORE key max min,
/// then `[WITHSCORES] [LIMIT offset count]`
fn range_by_score(db: &Db, args: &[Bytes], desc: bool) -> Result<Frame, ReplyError> {
    let (min, max) = if desc {
        (parse_border(&args[2])?, parse_border(&args[1])?)
    } else {
        (parse_border(&args[1])?, parse_border(&args[2])?)
    };

    let mut with_scores = false;
    let mut offset: i64 = 0;
    let mut limit: i64 = -1;
    let mut i = 3;
    while i < args.len() {
        match upper(&args[i]).as_str() {
            "WITHSCORES" => {
                with_scores = true;
                i += 1;
            }
            "LIMIT" => {
                if i + 2 >= args.len() {
                    return Err(ReplyError::syntax());
                }
                offset = parse_i64(&args[i + 1])?;
                limit = parse_i64(&args[i + 2])?;
                i += 3;
            }
            _ => return Err(ReplyError::syntax()),
        }
    }
    if offset < 0 {
        return Ok(Frame::empty_array());
    }

    let elements = db
        .with_zset(&args[0], |set| {
            set.range_by_score(&min, &max, offset as usize, limit, desc)
        })?
        .unwrap_or_default();
    Ok(elements_reply(&elements, with_scores))
}

fn exec_zrangebyscore(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    range_by_score(db, args, false)
}

fn exec_zrevrangebyscore(db: &Db, args: &[Bytes]) -> Result<Frame, ReplyError> {
    range_by_score(db, args, true)
}
