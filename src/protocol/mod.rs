//! Protocol Module
//!
//! Defines the wire protocol for client-server and node-to-node communication.
//!
//! ## Protocol Format (V2 - Framed Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Flags (1)│ Len (4)  │     Payload (bincode)       │
//! └──────────┴──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: GET            - Payload: key
//! - 0x02: PUT            - Payload: (key, value)
//! - 0x03: DEL            - Payload: key
//! - 0x04: PING           - Payload: empty
//! - 0x05: SCAN           - Payload: ScanRequest
//! - 0x06: BATCH_PUT      - Payload: [(key, value)]
//! - 0x07: CLUSTER_STATUS - Payload: probe flag
//!
//! ### Flags
//! - 0x01: REPLICATION - request was sent by a peer; apply locally, never fan out
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK            - bincode body for the command
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR         - UTF-8 message
//! - 0x03: INVALID       - UTF-8 message
//! - 0x04: QUORUM_FAILED - UTF-8 message
//! - 0x05: UNAVAILABLE   - UTF-8 message
//! - 0x06: PARTIAL       - UTF-8 message

mod codec;
mod command;
mod response;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, MAX_PAYLOAD_SIZE, REQUEST_HEADER_SIZE,
    RESPONSE_HEADER_SIZE,
};
pub use command::{Command, CommandType, Request, FLAG_REPLICATION};
pub use response::{Response, Status};
