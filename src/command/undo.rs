//! Undo log builders
//!
//! Each builder inspects the state *before* a command runs and returns the
//! command lines that restore it.

use bytes::Bytes;

use super::args::pexpireat_line;
use crate::database::Db;
use crate::protocol::CmdLine;

/// Restore every key in `keys` to its current value and deadline
pub fn rollback_given_keys(db: &Db, keys: &[Bytes]) -> Vec<CmdLine> {
    let mut lines = Vec::with_capacity(keys.len());
    for key in keys {
        lines.push(vec![Bytes::from_static(b"DEL"), key.clone()]);
        let Some(entity) = db.get_entity(key) else {
            continue;
        };
        lines.push(entity.to_cmd_line(key));
        if let Some(at) = db.ttl_of(key) {
            lines.push(pexpireat_line(key, at));
        }
    }
    lines
}

/// Undo for commands that only touch their first argument
pub fn rollback_first_key(db: &Db, args: &[Bytes]) -> Vec<CmdLine> {
    rollback_given_keys(db, &args[..args.len().min(1)])
}

/// Restore the scores of `fields` in the sorted set at `key`
pub fn rollback_zset_fields(db: &Db, key: &Bytes, fields: &[Bytes]) -> Vec<CmdLine> {
    let scores = match db.with_zset(key, |set| {
        fields
            .iter()
            .map(|field| set.get(field))
            .collect::<Vec<_>>()
    }) {
        Ok(Some(scores)) => scores,
        Ok(None) => return vec![vec![Bytes::from_static(b"DEL"), key.clone()]],
        // the command itself will fail with WRONGTYPE
        Err(_) => return Vec::new(),
    };

    fields
        .iter()
        .zip(scores)
        .map(|(field, score)| match score {
            Some(score) => vec![
                Bytes::from_static(b"ZADD"),
                key.clone(),
                Bytes::from(score.to_string()),
                field.clone(),
            ],
            None => vec![Bytes::from_static(b"ZREM"), key.clone(), field.clone()],
        })
        .collect()
}
