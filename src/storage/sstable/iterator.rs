//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{KvError, Result};
use crate::memtable::MemTableEntry;

use super::{decode_record, HEADER_SIZE, TOMBSTONE_MARKER};

/// Iterator over SSTable entries in sorted key order
///
/// Owns its own file handle so iteration never contends with point lookups.
pub struct SSTableIterator {
    file: BufReader<File>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
}

impl SSTableIterator {
    pub(super) fn open(path: &Path, end_offset: u64) -> Result<Self> {
        let mut file = BufReader::new(File::open(path)?);
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: HEADER_SIZE,
        })
    }

    /// Read the raw record at the current position
    fn read_raw(&mut self) -> Result<(String, Option<Vec<u8>>)> {
        let (key, value, size) = read_raw_record(&mut self.file)?;
        self.current_offset += size;
        Ok((key, value))
    }
}

/// Read one `[key_len][val_len][key][value]` record, returning its encoded size
pub(super) fn read_raw_record<R: Read>(reader: &mut R) -> Result<(String, Option<Vec<u8>>, u64)> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;

    let key_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let val_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let mut key = vec![0u8; key_len];
    reader.read_exact(&mut key)?;
    let key = String::from_utf8(key)
        .map_err(|e| KvError::Storage(format!("non UTF-8 key in SSTable: {}", e)))?;

    let mut size = 8 + key_len as u64;
    let value = if val_len == TOMBSTONE_MARKER {
        None
    } else {
        let mut v = vec![0u8; val_len as usize];
        reader.read_exact(&mut v)?;
        size += val_len as u64;
        Some(v)
    };

    Ok((key, value, size))
}

impl Iterator for SSTableIterator {
    type Item = Result<(String, MemTableEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_offset >= self.end_offset {
            return None;
        }

        Some(
            self.read_raw()
                .and_then(|(key, value)| decode_record(&key, value).map(|record| (key, record))),
        )
    }
}
