//! Command definitions
//!
//! Represents requests from clients and peers.

use bytes::Bytes;

use crate::kv::ScanRequest;

/// Request flag: sent by a peer as part of replication
pub const FLAG_REPLICATION: u8 = 0x01;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Delete = 0x03,
    Ping = 0x04,
    Scan = 0x05,
    BatchPut = 0x06,
    ClusterStatus = 0x07,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Get),
            0x02 => Some(CommandType::Put),
            0x03 => Some(CommandType::Delete),
            0x04 => Some(CommandType::Ping),
            0x05 => Some(CommandType::Scan),
            0x06 => Some(CommandType::BatchPut),
            0x07 => Some(CommandType::ClusterStatus),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Upsert a key-value pair
    Put { key: String, value: Bytes },

    /// Delete a key
    Delete { key: String },

    /// Ping (liveness probe)
    Ping,

    /// One page of a range scan
    Scan(ScanRequest),

    /// Bulk upsert
    BatchPut { items: Vec<(String, Bytes)> },

    /// Cluster health report; `probe` forces a fresh check of every peer
    ClusterStatus { probe: bool },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Delete { .. } => CommandType::Delete,
            Command::Ping => CommandType::Ping,
            Command::Scan(_) => CommandType::Scan,
            Command::BatchPut { .. } => CommandType::BatchPut,
            Command::ClusterStatus { .. } => CommandType::ClusterStatus,
        }
    }
}

/// A command plus its frame flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub flags: u8,
}

impl Request {
    /// A request from an ordinary client
    pub fn new(command: Command) -> Self {
        Self { command, flags: 0 }
    }

    /// A request forwarded by a peer that must not be re-replicated
    pub fn replicated(command: Command) -> Self {
        Self {
            command,
            flags: FLAG_REPLICATION,
        }
    }

    pub fn is_replication(&self) -> bool {
        self.flags & FLAG_REPLICATION != 0
    }
}

impl From<Command> for Request {
    fn from(command: Command) -> Self {
        Request::new(command)
    }
}
