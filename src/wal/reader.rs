//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{KvError, Result};

use super::{WalEntry, HEADER_SIZE, MAX_RECORD_SIZE};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset of the next unread frame
    position: u64,
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// `Ok(None)` at a clean end of file. A torn or corrupted frame is a
    /// `WalCorruption` error and leaves `position` at the start of that frame.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return Err(KvError::WalCorruption(format!(
                "partial header at offset {} ({} bytes)",
                self.position, remaining
            )));
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;

        let lsn = u64::from_le_bytes(header[0..8].try_into().unwrap_or_default());
        let crc = u32::from_le_bytes(header[8..12].try_into().unwrap_or_default());
        let len = u32::from_le_bytes(header[12..16].try_into().unwrap_or_default());

        if len > MAX_RECORD_SIZE || (len as u64) > remaining - HEADER_SIZE as u64 {
            return Err(KvError::WalCorruption(format!(
                "partial body at offset {} (LSN {}, declared {} bytes)",
                self.position, lsn, len
            )));
        }

        let mut body = vec![0u8; len as usize];
        self.reader.read_exact(&mut body)?;

        if WalEntry::compute_crc(lsn, &body) != crc {
            return Err(KvError::WalCorruption(format!(
                "CRC mismatch at offset {} (LSN {})",
                self.position, lsn
            )));
        }

        let entry = WalEntry::decode_body(lsn, &body)?;
        self.position += HEADER_SIZE as u64 + len as u64;
        Ok(Some(entry))
    }

    /// Offset just past the last successfully read frame
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries; yields the first error and then stops
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
