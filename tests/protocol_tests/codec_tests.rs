//! Codec Tests
//!
//! Tests for request and response framing.

use std::io::Cursor;

use bytes::Bytes;
use quorumkv::kv::ScanRequest;
use quorumkv::protocol::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, Command, Request, Response, Status,
    FLAG_REPLICATION, MAX_PAYLOAD_SIZE, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE,
};
use quorumkv::KvError;

// =============================================================================
// Request Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_request_header_layout() {
    let request = Request::new(Command::Get {
        key: "hello".to_string(),
    });
    let encoded = encode_request(&request).unwrap();

    assert_eq!(encoded[0], 0x01);
    assert_eq!(encoded[1], 0x00);
    let len = u32::from_be_bytes([encoded[2], encoded[3], encoded[4], encoded[5]]) as usize;
    assert_eq!(encoded.len(), REQUEST_HEADER_SIZE + len);
}

#[test]
fn test_put_with_replication_flag() {
    let request = Request::replicated(Command::Put {
        key: "mykey".to_string(),
        value: Bytes::from_static(b"\x00binary\xff"),
    });
    let encoded = encode_request(&request).unwrap();
    assert_eq!(encoded[1], FLAG_REPLICATION);

    let decoded = decode_request(&encoded).unwrap();
    assert!(decoded.is_replication());
    assert_eq!(decoded, request);
}

#[test]
fn test_ping_has_empty_payload() {
    let encoded = encode_request(&Request::new(Command::Ping)).unwrap();
    assert_eq!(encoded, vec![0x04, 0x00, 0, 0, 0, 0]);
    assert_eq!(decode_request(&encoded).unwrap().command, Command::Ping);
}

#[test]
fn test_ping_with_payload_rejected() {
    let bytes = vec![0x04, 0x00, 0, 0, 0, 1, 0xAA];
    assert!(matches!(decode_request(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_scan_batch_and_status_commands() {
    let commands = vec![
        Command::Scan(ScanRequest::new("a", "m").limit(25).cursor("c")),
        Command::BatchPut {
            items: vec![
                ("k1".to_string(), Bytes::from_static(b"v1")),
                ("k2".to_string(), Bytes::new()),
            ],
        },
        Command::ClusterStatus { probe: true },
        Command::Delete {
            key: "gone".to_string(),
        },
    ];

    for command in commands {
        let request = Request::new(command);
        let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();
        assert_eq!(decoded, request);
        assert!(!decoded.is_replication());
    }
}

#[test]
fn test_unknown_command_rejected() {
    let bytes = vec![0xFF, 0x00, 0, 0, 0, 0];
    let err = decode_request(&bytes).unwrap_err();
    assert!(matches!(err, KvError::Protocol(ref m) if m.contains("0xff")));
}

#[test]
fn test_incomplete_request_header() {
    assert!(matches!(
        decode_request(&[0x01, 0x00, 0x00]),
        Err(KvError::Protocol(_))
    ));
}

#[test]
fn test_incomplete_request_payload() {
    let encoded = encode_request(&Request::new(Command::Get {
        key: "somekey".to_string(),
    }))
    .unwrap();
    let truncated = &encoded[..encoded.len() - 2];
    assert!(matches!(decode_request(truncated), Err(KvError::Protocol(_))));
}

#[test]
fn test_malformed_payload_rejected() {
    // PUT whose payload is too short to hold a (String, Bytes) pair
    let bytes = vec![0x02, 0x00, 0, 0, 0, 2, 0x05, 0x00];
    assert!(matches!(decode_request(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_oversized_length_rejected() {
    let len = MAX_PAYLOAD_SIZE + 1;
    let mut bytes = vec![0x01, 0x00];
    bytes.extend_from_slice(&len.to_be_bytes());
    assert!(matches!(decode_request(&bytes), Err(KvError::Protocol(_))));

    let mut stream = Cursor::new(bytes);
    assert!(matches!(read_request(&mut stream), Err(KvError::Protocol(_))));
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_response_layout() {
    let encoded = encode_response(&Response::failure(Status::Invalid, "bad")).unwrap();
    assert_eq!(encoded, vec![0x03, 0, 0, 0, 3, b'b', b'a', b'd']);
    assert_eq!(encoded.len(), RESPONSE_HEADER_SIZE + 3);
}

#[test]
fn test_unknown_status_rejected() {
    let bytes = vec![0x7F, 0, 0, 0, 0];
    assert!(matches!(decode_response(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_incomplete_response() {
    assert!(decode_response(&[0x00, 0x00]).is_err());
    assert!(decode_response(&[0x00, 0, 0, 0, 4, 1, 2]).is_err());
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_carries_consecutive_frames() {
    let mut buffer = Vec::new();
    write_request(&mut buffer, &Request::new(Command::Ping)).unwrap();
    write_request(
        &mut buffer,
        &Request::replicated(Command::Delete {
            key: "k".to_string(),
        }),
    )
    .unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_request(&mut cursor).unwrap().command, Command::Ping);
    let second = read_request(&mut cursor).unwrap();
    assert!(second.is_replication());
    assert!(matches!(read_request(&mut cursor), Err(KvError::Io(_))));
}

#[test]
fn test_stream_response() {
    let response = Response::ok(&vec!["a".to_string(), "b".to_string()]).unwrap();
    let mut buffer = Vec::new();
    write_response(&mut buffer, &response).unwrap();

    let read = read_response(&mut Cursor::new(buffer)).unwrap();
    let body: Vec<String> = read.into_body().unwrap();
    assert_eq!(body, vec!["a", "b"]);
}
