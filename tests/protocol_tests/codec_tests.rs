//! Codec Tests
//!
//! Tests for frame encoding and streaming decoding.

use std::io::Cursor;

use bytes::Bytes;
use embedkv::protocol::{decode, encode_command, write_frame, FrameReader};
use embedkv::{cmd_line, Frame, KvError};

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_simple_frames() {
    assert_eq!(Frame::ok().to_bytes(), Bytes::from("+OK\r\n"));
    assert_eq!(Frame::error("ERR bad").to_bytes(), Bytes::from("-ERR bad\r\n"));
    assert_eq!(Frame::Integer(-42).to_bytes(), Bytes::from(":-42\r\n"));
    assert_eq!(Frame::bulk("hello").to_bytes(), Bytes::from("$5\r\nhello\r\n"));
}

#[test]
fn test_encode_null_and_empty() {
    assert_eq!(Frame::null_bulk().to_bytes(), Bytes::from("$-1\r\n"));
    assert_eq!(Frame::null_array().to_bytes(), Bytes::from("*-1\r\n"));
    assert_eq!(Frame::empty_array().to_bytes(), Bytes::from("*0\r\n"));
    assert_eq!(Frame::bulk("").to_bytes(), Bytes::from("$0\r\n\r\n"));
}

#[test]
fn test_encode_command() {
    let encoded = encode_command(&cmd_line(&["GET", "x"]));
    assert_eq!(encoded, Bytes::from("*2\r\n$3\r\nGET\r\n$1\r\nx\r\n"));
}

#[test]
fn test_status_and_error_lines_cannot_be_split() {
    let error = Frame::error("ERR unknown command 'a\r\n+OK'").to_bytes();
    assert_eq!(error, Bytes::from("-ERR unknown command 'a  +OK'\r\n"));
    assert_eq!(decode(&error).unwrap(), Frame::error("ERR unknown command 'a  +OK'"));

    let status = Frame::status("one\ntwo").to_bytes();
    assert_eq!(status, Bytes::from("+one two\r\n"));
}

#[test]
fn test_write_frame_to_stream() {
    let mut out = Vec::new();
    write_frame(&mut out, &Frame::Integer(7)).unwrap();
    assert_eq!(out, b":7\r\n");
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_get_command() {
    let frame = decode(b"*2\r\n$3\r\nGET\r\n$1\r\nx\r\n").unwrap();
    assert_eq!(frame, Frame::multi_bulk(["GET", "x"]));
    assert_eq!(frame.into_cmd_line(), Some(cmd_line(&["GET", "x"])));
}

#[test]
fn test_round_trip_every_variant() {
    let frames = vec![
        Frame::ok(),
        Frame::error("WRONGTYPE Operation against a key holding the wrong kind of value"),
        Frame::Integer(0),
        Frame::Integer(i64::MIN),
        Frame::bulk("with\r\nCRLF inside"),
        Frame::bulk(""),
        Frame::null_bulk(),
        Frame::null_array(),
        Frame::empty_array(),
        Frame::Array(Some(vec![
            Frame::Integer(1),
            Frame::Array(Some(vec![Frame::bulk("nested"), Frame::null_bulk()])),
            Frame::status("QUEUED"),
        ])),
    ];
    for frame in frames {
        let decoded = decode(&frame.to_bytes()).unwrap();
        assert_eq!(decoded, frame);
    }
}

#[test]
fn test_decode_binary_bulk() {
    let payload: Vec<u8> = (0u8..=255).collect();
    let frame = Frame::bulk(payload.clone());
    assert_eq!(decode(&frame.to_bytes()).unwrap(), Frame::bulk(payload));
}

#[test]
fn test_decode_truncated_frame() {
    let err = decode(b"$5\r\nab").unwrap_err();
    assert!(matches!(err, KvError::UnexpectedEof));

    let err = decode(b"*2\r\n$3\r\nGET\r\n").unwrap_err();
    assert!(matches!(err, KvError::UnexpectedEof));
}

#[test]
fn test_decode_rejects_bad_lengths() {
    assert!(matches!(decode(b"$abc\r\n"), Err(KvError::Protocol(_))));
    assert!(matches!(decode(b"*-5\r\n"), Err(KvError::Protocol(_))));
    assert!(matches!(decode(b":12x\r\n"), Err(KvError::Protocol(_))));
}

#[test]
fn test_into_cmd_line_rejects_non_commands() {
    assert_eq!(Frame::ok().into_cmd_line(), None);
    assert_eq!(Frame::empty_array().into_cmd_line(), None);
    assert_eq!(
        Frame::Array(Some(vec![Frame::bulk("GET"), Frame::Integer(1)])).into_cmd_line(),
        None
    );
}

// =============================================================================
// Stream Tests
// =============================================================================

#[test]
fn test_reader_yields_frames_in_order() {
    let mut input = Vec::new();
    input.extend_from_slice(&encode_command(&cmd_line(&["SET", "k", "v"])));
    input.extend_from_slice(b"+OK\r\n");
    input.extend_from_slice(b":3\r\n");

    let frames: Vec<Frame> = FrameReader::new(Cursor::new(input))
        .map(|frame| frame.unwrap())
        .collect();
    assert_eq!(
        frames,
        vec![
            Frame::multi_bulk(["SET", "k", "v"]),
            Frame::ok(),
            Frame::Integer(3),
        ]
    );
}

#[test]
fn test_reader_recovers_after_malformed_frame() {
    let input = b"?oops\r\n+OK\r\n".to_vec();
    let mut reader = FrameReader::new(Cursor::new(input));

    assert!(matches!(reader.next(), Some(Err(KvError::Protocol(_)))));
    assert_eq!(reader.next().unwrap().unwrap(), Frame::ok());
    assert!(reader.next().is_none());
}

#[test]
fn test_reader_stops_after_unexpected_eof() {
    let input = b"+OK\r\n$10\r\nshort".to_vec();
    let mut reader = FrameReader::new(Cursor::new(input));

    assert_eq!(reader.next().unwrap().unwrap(), Frame::ok());
    assert!(matches!(reader.next(), Some(Err(KvError::UnexpectedEof))));
    assert!(reader.next().is_none());
}

#[test]
fn test_read_frame_reports_clean_end() {
    let mut reader = FrameReader::new(Cursor::new(b":1\r\n".to_vec()));
    assert_eq!(reader.read_frame().unwrap(), Some(Frame::Integer(1)));
    assert_eq!(reader.read_frame().unwrap(), None);
}

#[test]
fn test_oversized_line_is_skipped() {
    let mut input = vec![b'+'];
    input.extend(std::iter::repeat(b'a').take(70 * 1024));
    input.extend_from_slice(b"\r\n+OK\r\n");
    let mut reader = FrameReader::new(Cursor::new(input));

    assert!(matches!(reader.next(), Some(Err(KvError::Protocol(msg))) if msg == "line too long"));
    assert_eq!(reader.next().unwrap().unwrap(), Frame::ok());
    assert!(reader.next().is_none());
}

#[test]
fn test_unterminated_long_line_is_rejected() {
    let mut input = b"$".to_vec();
    input.extend(std::iter::repeat(b'9').take(256 * 1024));
    let mut reader = FrameReader::new(Cursor::new(input));

    assert!(matches!(reader.next(), Some(Err(KvError::Protocol(msg))) if msg == "line too long"));
    assert!(reader.next().is_none());
}
