//! Response definitions
//!
//! Represents responses to clients.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{KvError, Result};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    Invalid = 0x03,
    QuorumFailed = 0x04,
    Unavailable = 0x05,
    Partial = 0x06,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Status::Ok),
            0x01 => Some(Status::NotFound),
            0x02 => Some(Status::Error),
            0x03 => Some(Status::Invalid),
            0x04 => Some(Status::QuorumFailed),
            0x05 => Some(Status::Unavailable),
            0x06 => Some(Status::Partial),
            _ => None,
        }
    }

    /// Status reported for a failed operation
    pub fn for_error(error: &KvError) -> Self {
        match error {
            KvError::KeyNotFound => Status::NotFound,
            KvError::Validation(_) | KvError::Protocol(_) => Status::Invalid,
            KvError::QuorumFailure { .. } => Status::QuorumFailed,
            KvError::StoreUnavailable(_)
            | KvError::Io(_)
            | KvError::WalCorruption(_)
            | KvError::Storage(_) => Status::Unavailable,
            KvError::PartialBatch { .. } => Status::Partial,
            _ => Status::Error,
        }
    }
}

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Bincode body for OK, UTF-8 message for failures, empty otherwise
    pub payload: Vec<u8>,
}

impl Response {
    /// Create an OK response carrying a bincode body
    pub fn ok<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self {
            status: Status::Ok,
            payload: bincode::serialize(body)?,
        })
    }

    /// Create an OK response with no body
    pub fn empty() -> Self {
        Self {
            status: Status::Ok,
            payload: Vec::new(),
        }
    }

    /// Create a NOT_FOUND response
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: Vec::new(),
        }
    }

    /// Create a failure response with a message
    pub fn failure(status: Status, message: &str) -> Self {
        Self {
            status,
            payload: message.as_bytes().to_vec(),
        }
    }

    /// Create the response for a failed operation
    pub fn from_error(error: &KvError) -> Self {
        match Status::for_error(error) {
            Status::NotFound => Self::not_found(),
            status => Self::failure(status, &error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Failure message, if any
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Decode the body of an OK response, or turn a failure status into an error
    pub fn into_body<T: DeserializeOwned>(self) -> Result<T> {
        match self.status {
            Status::Ok => Ok(bincode::deserialize(&self.payload)?),
            Status::NotFound => Err(KvError::KeyNotFound),
            status => Err(KvError::Remote {
                status,
                message: self.message(),
            }),
        }
    }

    /// Like [`Response::into_body`] for responses whose body is irrelevant
    pub fn into_unit(self) -> Result<()> {
        match self.status {
            Status::Ok => Ok(()),
            Status::NotFound => Err(KvError::KeyNotFound),
            status => Err(KvError::Remote {
                status,
                message: self.message(),
            }),
        }
    }
}
