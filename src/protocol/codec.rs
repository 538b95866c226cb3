//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Flags (1)│ Len (4)  │         Payload             │
//! └──────────┴──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type (bincode)
//! - GET:            String
//! - PUT:            (String, Bytes)
//! - DELETE:         String
//! - PING:           empty
//! - SCAN:           ScanRequest
//! - BATCH_PUT:      Vec<(String, Bytes)>
//! - CLUSTER_STATUS: bool
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::{Command, CommandType, Request, Response, Status};
use crate::error::{KvError, Result};
use crate::kv::ScanRequest;

/// Request header: 1 byte command + 1 byte flags + 4 bytes length
pub const REQUEST_HEADER_SIZE: usize = 6;

/// Response header: 1 byte status + 4 bytes length
pub const RESPONSE_HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
///
/// Format: cmd_type (1) + flags (1) + payload_len (4) + payload
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let command = &request.command;

    let payload = match command {
        Command::Get { key } | Command::Delete { key } => bincode::serialize(key)?,
        Command::Put { key, value } => bincode::serialize(&(key, value))?,
        Command::Ping => Vec::new(),
        Command::Scan(scan) => bincode::serialize(scan)?,
        Command::BatchPut { items } => bincode::serialize(items)?,
        Command::ClusterStatus { probe } => bincode::serialize(probe)?,
    };

    check_payload_len(payload.len())?;

    let mut message = Vec::with_capacity(REQUEST_HEADER_SIZE + payload.len());
    message.push(command.command_type() as u8);
    message.push(request.flags);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(&payload);

    Ok(message)
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    if bytes.len() < REQUEST_HEADER_SIZE {
        return Err(KvError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            REQUEST_HEADER_SIZE,
            bytes.len()
        )));
    }

    // Parse header
    let cmd_byte = bytes[0];
    let flags = bytes[1];
    let payload_len = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
    check_payload_len(payload_len)?;

    let total_len = REQUEST_HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(KvError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let payload = &bytes[REQUEST_HEADER_SIZE..total_len];
    let command = decode_command(cmd_byte, payload)?;

    Ok(Request { command, flags })
}

fn decode_command(cmd_byte: u8, payload: &[u8]) -> Result<Command> {
    let cmd_type = CommandType::from_byte(cmd_byte).ok_or_else(|| {
        KvError::Protocol(format!("Unknown command type: 0x{:02x}", cmd_byte))
    })?;

    let command = match cmd_type {
        CommandType::Get => Command::Get {
            key: decode_payload(cmd_type, payload)?,
        },
        CommandType::Put => {
            let (key, value): (String, Bytes) = decode_payload(cmd_type, payload)?;
            Command::Put { key, value }
        }
        CommandType::Delete => Command::Delete {
            key: decode_payload(cmd_type, payload)?,
        },
        CommandType::Ping => {
            if !payload.is_empty() {
                return Err(KvError::Protocol(format!(
                    "PING command: unexpected payload of {} bytes",
                    payload.len()
                )));
            }
            Command::Ping
        }
        CommandType::Scan => Command::Scan(decode_payload::<ScanRequest>(cmd_type, payload)?),
        CommandType::BatchPut => Command::BatchPut {
            items: decode_payload(cmd_type, payload)?,
        },
        CommandType::ClusterStatus => Command::ClusterStatus {
            probe: decode_payload(cmd_type, payload)?,
        },
    };

    Ok(command)
}

fn decode_payload<T: DeserializeOwned>(cmd_type: CommandType, payload: &[u8]) -> Result<T> {
    bincode::deserialize(payload)
        .map_err(|e| KvError::Protocol(format!("{:?} command: malformed payload: {}", cmd_type, e)))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    check_payload_len(response.payload.len())?;

    let mut message = Vec::with_capacity(RESPONSE_HEADER_SIZE + response.payload.len());
    message.push(response.status as u8);
    message.extend_from_slice(&(response.payload.len() as u32).to_be_bytes());
    message.extend_from_slice(&response.payload);

    Ok(message)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    if bytes.len() < RESPONSE_HEADER_SIZE {
        return Err(KvError::Protocol(format!(
            "Incomplete response header: expected {} bytes, got {}",
            RESPONSE_HEADER_SIZE,
            bytes.len()
        )));
    }

    let status_byte = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    check_payload_len(payload_len)?;

    let total_len = RESPONSE_HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(KvError::Protocol(format!(
            "Incomplete response payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let status = Status::from_byte(status_byte).ok_or_else(|| {
        KvError::Protocol(format!("Unknown response status: 0x{:02x}", status_byte))
    })?;

    Ok(Response {
        status,
        payload: bytes[RESPONSE_HEADER_SIZE..total_len].to_vec(),
    })
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE as usize {
        return Err(KvError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete request from a stream
///
/// Blocks until a complete request is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let mut header = [0u8; REQUEST_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]) as usize;
    check_payload_len(payload_len)?;

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    let command = decode_command(header[0], &payload)?;
    Ok(Request {
        command,
        flags: header[1],
    })
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let mut header = [0u8; RESPONSE_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let status = Status::from_byte(header[0]).ok_or_else(|| {
        KvError::Protocol(format!("Unknown response status: 0x{:02x}", header[0]))
    })?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    check_payload_len(payload_len)?;

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    Ok(Response { status, payload })
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
