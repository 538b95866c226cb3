//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{KvError, Result};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest record body accepted on read (guards against garbage lengths)
pub const MAX_RECORD_SIZE: u32 = 256 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Store the full post-write entry for a key
    Upsert(Entry),

    /// Delete a key
    Delete { key: String },

    /// Entries of one batch chunk, replayed all-or-nothing
    Chunk(Vec<Entry>),
}

/// On-disk body of a frame
#[derive(Serialize, Deserialize)]
struct Body {
    operation: Operation,
    timestamp: u64,
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation, timestamp: u64) -> Self {
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as a complete frame: header + body
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(&Body {
            operation: self.operation.clone(),
            timestamp: self.timestamp,
        })?;

        let crc = Self::compute_crc(self.lsn, &body);

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decode a frame body after the header has been read and its CRC verified
    pub fn decode_body(lsn: u64, body: &[u8]) -> Result<Self> {
        let decoded: Body = bincode::deserialize(body)
            .map_err(|e| KvError::WalCorruption(format!("undecodable entry at LSN {}: {}", lsn, e)))?;
        Ok(Self {
            lsn,
            operation: decoded.operation,
            timestamp: decoded.timestamp,
        })
    }

    /// CRC32 over the LSN and the body bytes
    pub fn compute_crc(lsn: u64, body: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(body);
        hasher.finalize()
    }
}
