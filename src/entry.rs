//! Entry definitions
//!
//! The record stored for every live key.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest accepted key, in bytes
pub const MAX_KEY_LEN: usize = 255;

/// A stored key/value pair with its version metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique, sortable, immutable once created
    pub key: String,

    /// Opaque value bytes
    pub value: Bytes,

    /// Starts at 1, +1 on every successful local upsert
    pub version: u64,

    /// Unix millis, set once on creation
    pub created_at: u64,

    /// Unix millis, set on every upsert
    pub updated_at: u64,
}

impl Entry {
    /// A freshly created entry at version 1
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>, now: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// The successor of this entry after replacing its value
    pub fn next_version(&self, value: Bytes, now: u64) -> Self {
        Self {
            key: self.key.clone(),
            value,
            version: self.version + 1,
            created_at: self.created_at,
            updated_at: now,
        }
    }

    /// Approximate in-memory footprint, used for memtable accounting
    pub fn approximate_size(&self) -> usize {
        self.key.len() + self.value.len() + 24
    }
}

/// Reject keys that cannot be stored
pub fn validate_key(key: &str) -> std::result::Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::InvalidKey("key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(ValidationError::InvalidKey(format!(
            "key is {} bytes, max {}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    Ok(())
}
