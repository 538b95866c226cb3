//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups and bounded range reads
//! via an in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{KvError, Result};
use crate::memtable::MemTableEntry;
use crate::store::KeyRange;

use super::iterator::{read_raw_record, SSTableIterator};
use super::{decode_record, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
///
/// The file handle sits behind its own mutex so lookups only need `&self`; the
/// storage manager can then serve reads under a shared lock.
pub struct SSTableReader {
    path: PathBuf,
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<String, u64>,
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header and data CRC, then loads the entire index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(KvError::Storage(format!(
                "SSTable {} too small ({} bytes)",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(KvError::Storage(format!(
                "Invalid SSTable magic: expected QKVS, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(KvError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header[6..14]);
        let entry_count = u64::from_le_bytes(count_bytes);

        // Footer → index offset and data CRC
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let mut offset_bytes = [0u8; 8];
        offset_bytes.copy_from_slice(&footer[0..8]);
        let index_offset = u64::from_le_bytes(offset_bytes);
        let data_crc = u32::from_le_bytes([footer[8], footer[9], footer[10], footer[11]]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(KvError::Storage(format!(
                "SSTable {} has invalid index offset {}",
                path.display(),
                index_offset
            )));
        }

        // Verify the data block checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = index_offset - HEADER_SIZE;
        let mut buf = vec![0u8; 64 * 1024];
        while remaining > 0 {
            let n = remaining.min(buf.len() as u64) as usize;
            file.read_exact(&mut buf[..n])?;
            hasher.update(&buf[..n]);
            remaining -= n as u64;
        }
        if hasher.finalize() != data_crc {
            return Err(KvError::Storage(format!(
                "SSTable {} data CRC mismatch",
                path.display()
            )));
        }

        // Load index: [key_len(4)][offset(8)][key]
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.seek(SeekFrom::Start(index_offset))?;
        file.read_exact(&mut index_data)?;

        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos + 12 <= index_data.len() {
            let key_len = u32::from_le_bytes([
                index_data[pos],
                index_data[pos + 1],
                index_data[pos + 2],
                index_data[pos + 3],
            ]) as usize;
            pos += 4;

            let mut off = [0u8; 8];
            off.copy_from_slice(&index_data[pos..pos + 8]);
            let offset = u64::from_le_bytes(off);
            pos += 8;

            if pos + key_len > index_data.len() {
                return Err(KvError::Storage(format!(
                    "SSTable {} index truncated",
                    path.display()
                )));
            }
            let key = String::from_utf8(index_data[pos..pos + key_len].to_vec())
                .map_err(|e| KvError::Storage(format!("non UTF-8 key in index: {}", e)))?;
            pos += key_len;

            index.insert(key, offset);
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Get a record by key, O(log n) lookup via in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(Value(entry)))`: key found with value
    /// - `Ok(Some(Tombstone))`: key deleted in this SSTable
    /// - `Ok(None)`: key not in this SSTable
    pub fn get(&self, key: &str) -> Result<Option<MemTableEntry>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        let (stored_key, value) = self.read_at(offset)?;
        decode_record(&stored_key, value).map(Some)
    }

    /// Up to `max` records (tombstones included) inside `range`, in key order
    pub fn range(&self, range: &KeyRange, max: usize) -> Result<Vec<(String, MemTableEntry)>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let offsets: Vec<u64> = self
            .index
            .range::<str, _>(range.as_bounds())
            .take(max)
            .map(|(_, &off)| off)
            .collect();

        let mut out = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let (key, value) = self.read_at(offset)?;
            let record = decode_record(&key, value)?;
            out.push((key, record));
        }
        Ok(out)
    }

    fn read_at(&self, offset: u64) -> Result<(String, Option<Vec<u8>>)> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let (key, value, _) = read_raw_record(&mut *file)?;
        Ok((key, value))
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&str> {
        self.index.keys().next().map(|k| k.as_str())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&str> {
        self.index.keys().next_back().map(|k| k.as_str())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &str) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an iterator over all entries (for compaction, debugging)
    pub fn iter(&self) -> Result<SSTableIterator> {
        SSTableIterator::open(&self.path, self.index_offset)
    }
}
