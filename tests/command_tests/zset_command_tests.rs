//! Sorted Set Command Tests
//!
//! These tests verify:
//! - ZADD/ZSCORE/ZINCRBY/ZCARD and member updates
//! - Rank queries and rank ranges in both directions
//! - Score ranges with exclusive borders, WITHSCORES and LIMIT
//! - ZPOPMIN/ZPOPMAX and the range removals
//! - Members compared by their raw bytes

use bytes::Bytes;
use embedkv::{cmd_line, Config, Engine, Frame, Session};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (Engine, Session) {
    let config = Config::builder().databases(1).shard_count(16).build();
    (Engine::open(config).unwrap(), Session::new())
}

fn run(engine: &Engine, session: &mut Session, args: &[&str]) -> Frame {
    engine.exec(session, &cmd_line(args))
}

fn run_raw(engine: &Engine, session: &mut Session, args: &[&[u8]]) -> Frame {
    let line: Vec<Bytes> = args.iter().map(|arg| Bytes::copy_from_slice(arg)).collect();
    engine.exec(session, &line)
}

/// z = {a:1, b:2, c:3, d:4, e:5}
fn setup_abcde() -> (Engine, Session) {
    let (engine, mut s) = setup();
    assert_eq!(
        run(&engine, &mut s, &["ZADD", "z", "1", "a", "2", "b", "3", "c", "4", "d", "5", "e"]),
        Frame::Integer(5)
    );
    (engine, s)
}

// =============================================================================
// Write Tests
// =============================================================================

#[test]
fn test_zadd_then_zrange_withscores() {
    let (engine, mut s) = setup();
    assert_eq!(run(&engine, &mut s, &["ZADD", "z", "1", "a", "2", "b"]), Frame::Integer(2));
    assert_eq!(
        run(&engine, &mut s, &["ZRANGE", "z", "0", "-1", "WITHSCORES"]),
        Frame::multi_bulk(["a", "1", "b", "2"])
    );
}

#[test]
fn test_zadd_counts_only_new_members() {
    let (engine, mut s) = setup();
    run(&engine, &mut s, &["ZADD", "z", "1", "a"]);
    assert_eq!(run(&engine, &mut s, &["ZADD", "z", "1", "a"]), Frame::Integer(0));
    assert_eq!(run(&engine, &mut s, &["ZADD", "z", "7.5", "a", "2", "b"]), Frame::Integer(1));
    assert_eq!(run(&engine, &mut s, &["ZSCORE", "z", "a"]), Frame::bulk("7.5"));
    assert_eq!(run(&engine, &mut s, &["ZCARD", "z"]), Frame::Integer(2));
}

#[test]
fn test_zadd_rejects_bad_input() {
    let (engine, mut s) = setup();
    assert_eq!(
        run(&engine, &mut s, &["ZADD", "z", "1", "a", "2"]),
        Frame::error("ERR syntax error")
    );
    assert_eq!(
        run(&engine, &mut s, &["ZADD", "z", "abc", "a"]),
        Frame::error("ERR value is not a valid float")
    );
    assert_eq!(run(&engine, &mut s, &["EXISTS", "z"]), Frame::Integer(0));
}

#[test]
fn test_zincrby() {
    let (engine, mut s) = setup();
    assert_eq!(run(&engine, &mut s, &["ZINCRBY", "z", "2.5", "a"]), Frame::bulk("2.5"));
    assert_eq!(run(&engine, &mut s, &["ZINCRBY", "z", "-1", "a"]), Frame::bulk("1.5"));
    assert_eq!(run(&engine, &mut s, &["ZSCORE", "z", "a"]), Frame::bulk("1.5"));

    run(&engine, &mut s, &["ZADD", "z", "+inf", "b"]);
    assert_eq!(
        run(&engine, &mut s, &["ZINCRBY", "z", "-inf", "b"]),
        Frame::error("ERR resulting score is not a number (NaN)")
    );
}

#[test]
fn test_zrem_removes_key_when_empty() {
    let (engine, mut s) = setup();
    run(&engine, &mut s, &["ZADD", "z", "1", "a", "2", "b"]);
    assert_eq!(run(&engine, &mut s, &["ZREM", "z", "a", "nope"]), Frame::Integer(1));
    assert_eq!(run(&engine, &mut s, &["ZREM", "z", "b"]), Frame::Integer(1));
    assert_eq!(run(&engine, &mut s, &["EXISTS", "z"]), Frame::Integer(0));
    assert_eq!(run(&engine, &mut s, &["ZREM", "z", "b"]), Frame::Integer(0));
}

// =============================================================================
// Rank Tests
// =============================================================================

#[test]
fn test_zrank_and_zrevrank() {
    let (engine, mut s) = setup_abcde();
    assert_eq!(run(&engine, &mut s, &["ZRANK", "z", "a"]), Frame::Integer(0));
    assert_eq!(run(&engine, &mut s, &["ZRANK", "z", "e"]), Frame::Integer(4));
    assert_eq!(run(&engine, &mut s, &["ZREVRANK", "z", "e"]), Frame::Integer(0));
    assert_eq!(run(&engine, &mut s, &["ZRANK", "z", "zz"]), Frame::null_bulk());
    assert_eq!(run(&engine, &mut s, &["ZRANK", "missing", "a"]), Frame::null_bulk());
}

#[test]
fn test_zrange_and_zrevrange() {
    let (engine, mut s) = setup_abcde();
    assert_eq!(run(&engine, &mut s, &["ZRANGE", "z", "1", "2"]), Frame::multi_bulk(["b", "c"]));
    assert_eq!(run(&engine, &mut s, &["ZRANGE", "z", "-2", "-1"]), Frame::multi_bulk(["d", "e"]));
    assert_eq!(
        run(&engine, &mut s, &["ZREVRANGE", "z", "0", "1", "WITHSCORES"]),
        Frame::multi_bulk(["e", "5", "d", "4"])
    );
    assert_eq!(run(&engine, &mut s, &["ZRANGE", "z", "4", "1"]), Frame::empty_array());
    assert_eq!(run(&engine, &mut s, &["ZRANGE", "missing", "0", "-1"]), Frame::empty_array());
    assert_eq!(
        run(&engine, &mut s, &["ZRANGE", "z", "0", "1", "BOGUS"]),
        Frame::error("ERR syntax error")
    );
}

// =============================================================================
// Score Range Tests
// =============================================================================

#[test]
fn test_zcount_with_exclusive_borders() {
    let (engine, mut s) = setup_abcde();
    assert_eq!(run(&engine, &mut s, &["ZCOUNT", "z", "-inf", "+inf"]), Frame::Integer(5));
    assert_eq!(run(&engine, &mut s, &["ZCOUNT", "z", "2", "4"]), Frame::Integer(3));
    assert_eq!(run(&engine, &mut s, &["ZCOUNT", "z", "(2", "(4"]), Frame::Integer(1));
    assert_eq!(run(&engine, &mut s, &["ZCOUNT", "z", "6", "10"]), Frame::Integer(0));
    assert_eq!(
        run(&engine, &mut s, &["ZCOUNT", "z", "x", "10"]),
        Frame::error("ERR min or max is not a float")
    );
}

#[test]
fn test_zrangebyscore_with_limit() {
    let (engine, mut s) = setup_abcde();
    assert_eq!(
        run(&engine, &mut s, &["ZRANGEBYSCORE", "z", "(1", "4"]),
        Frame::multi_bulk(["b", "c", "d"])
    );
    assert_eq!(
        run(&engine, &mut s, &["ZRANGEBYSCORE", "z", "-inf", "+inf", "LIMIT", "1", "2"]),
        Frame::multi_bulk(["b", "c"])
    );
    assert_eq!(
        run(&engine, &mut s, &["ZRANGEBYSCORE", "z", "2", "3", "WITHSCORES"]),
        Frame::multi_bulk(["b", "2", "c", "3"])
    );
    assert_eq!(
        run(&engine, &mut s, &["ZRANGEBYSCORE", "z", "-inf", "+inf", "LIMIT", "-1", "2"]),
        Frame::empty_array()
    );
    assert_eq!(
        run(&engine, &mut s, &["ZRANGEBYSCORE", "z", "0", "10", "LIMIT", "1"]),
        Frame::error("ERR syntax error")
    );
}

#[test]
fn test_zrevrangebyscore_takes_max_first() {
    let (engine, mut s) = setup_abcde();
    assert_eq!(
        run(&engine, &mut s, &["ZREVRANGEBYSCORE", "z", "4", "(1"]),
        Frame::multi_bulk(["d", "c", "b"])
    );
    assert_eq!(
        run(&engine, &mut s, &["ZREVRANGEBYSCORE", "z", "+inf", "-inf", "WITHSCORES", "LIMIT", "0", "1"]),
        Frame::multi_bulk(["e", "5"])
    );
}

// =============================================================================
// Pop and Removal Tests
// =============================================================================

#[test]
fn test_zpopmin_and_zpopmax() {
    let (engine, mut s) = setup_abcde();
    assert_eq!(
        run(&engine, &mut s, &["ZPOPMIN", "z", "2"]),
        Frame::multi_bulk(["a", "1", "b", "2"])
    );
    assert_eq!(run(&engine, &mut s, &["ZPOPMAX", "z"]), Frame::multi_bulk(["e", "5"]));
    assert_eq!(run(&engine, &mut s, &["ZCARD", "z"]), Frame::Integer(2));

    assert_eq!(
        run(&engine, &mut s, &["ZPOPMAX", "z", "10"]),
        Frame::multi_bulk(["d", "4", "c", "3"])
    );
    assert_eq!(run(&engine, &mut s, &["EXISTS", "z"]), Frame::Integer(0));
    assert_eq!(run(&engine, &mut s, &["ZPOPMIN", "z"]), Frame::empty_array());
}

#[test]
fn test_zpop_rejects_negative_count() {
    let (engine, mut s) = setup_abcde();
    assert_eq!(
        run(&engine, &mut s, &["ZPOPMIN", "z", "-1"]),
        Frame::error("ERR value is out of range, must be positive")
    );
}

#[test]
fn test_zremrangebyscore() {
    let (engine, mut s) = setup_abcde();
    assert_eq!(run(&engine, &mut s, &["ZREMRANGEBYSCORE", "z", "(1", "3"]), Frame::Integer(2));
    assert_eq!(run(&engine, &mut s, &["ZRANGE", "z", "0", "-1"]), Frame::multi_bulk(["a", "d", "e"]));
}

#[test]
fn test_zremrangebyrank() {
    let (engine, mut s) = setup_abcde();
    assert_eq!(run(&engine, &mut s, &["ZREMRANGEBYRANK", "z", "0", "1"]), Frame::Integer(2));
    assert_eq!(run(&engine, &mut s, &["ZREMRANGEBYRANK", "z", "-1", "-1"]), Frame::Integer(1));
    assert_eq!(run(&engine, &mut s, &["ZRANGE", "z", "0", "-1"]), Frame::multi_bulk(["c", "d"]));
    assert_eq!(run(&engine, &mut s, &["ZREMRANGEBYRANK", "z", "0", "-1"]), Frame::Integer(2));
    assert_eq!(run(&engine, &mut s, &["EXISTS", "z"]), Frame::Integer(0));
}

#[test]
fn test_zset_commands_on_list_key() {
    let (engine, mut s) = setup();
    run(&engine, &mut s, &["RPUSH", "l", "a"]);
    let wrong = Frame::error("WRONGTYPE Operation against a key holding the wrong kind of value");
    assert_eq!(run(&engine, &mut s, &["ZADD", "l", "1", "a"]), wrong);
    assert_eq!(run(&engine, &mut s, &["ZSCORE", "l", "a"]), wrong);
    assert_eq!(run(&engine, &mut s, &["ZCARD", "l"]), wrong);
}

#[test]
fn test_binary_members_do_not_collide() {
    let (engine, mut s) = setup();
    assert_eq!(
        run_raw(&engine, &mut s, &[b"ZADD", b"z", b"1", b"\xff", b"2", b"\xfe"]),
        Frame::Integer(2)
    );
    assert_eq!(run(&engine, &mut s, &["ZCARD", "z"]), Frame::Integer(2));
    assert_eq!(run_raw(&engine, &mut s, &[b"ZSCORE", b"z", b"\xff"]), Frame::bulk("1"));
    assert_eq!(
        run(&engine, &mut s, &["ZRANGE", "z", "0", "-1"]),
        Frame::Array(Some(vec![
            Frame::Bulk(Some(Bytes::from_static(b"\xff"))),
            Frame::Bulk(Some(Bytes::from_static(b"\xfe"))),
        ]))
    );
    assert_eq!(run_raw(&engine, &mut s, &[b"ZREM", b"z", b"\xfe"]), Frame::Integer(1));
    assert_eq!(run_raw(&engine, &mut s, &[b"ZRANK", b"z", b"\xff"]), Frame::Integer(0));
}
