//! Range Scanner
//!
//! Cursor-based pagination over a half-open key interval. Rows are pulled from
//! the store in fixed-size chunks so memory stays bounded by the page size, not by
//! how many keys the interval holds.

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{Result, ValidationError};
use crate::store::{KeyRange, SharedStore};

/// Parameters of one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Inclusive lower bound
    pub start: String,
    /// Exclusive upper bound
    pub end: String,
    /// Page size; `None` means the configured maximum
    pub limit: Option<usize>,
    /// Last key of the previous page
    pub cursor: Option<String>,
}

impl ScanRequest {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            limit: None,
            cursor: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// One page of results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPage {
    pub entries: Vec<Entry>,
    /// Feed back as `cursor` to get the next page
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Paged reader over the store
pub struct RangeScanner {
    store: SharedStore,
    max_range_size: usize,
    scan_chunk_size: usize,
}

impl RangeScanner {
    pub fn new(store: SharedStore, max_range_size: usize, scan_chunk_size: usize) -> Self {
        Self {
            store,
            max_range_size: max_range_size.max(1),
            scan_chunk_size: scan_chunk_size.max(1),
        }
    }

    /// Read one page of `[max(start, cursor+), end)`
    pub fn scan(&self, request: &ScanRequest) -> Result<ScanPage> {
        if request.start > request.end {
            return Err(ValidationError::InvalidRange {
                start: request.start.clone(),
                end: request.end.clone(),
            }
            .into());
        }

        let limit = match request.limit {
            Some(0) => return Err(ValidationError::InvalidLimit.into()),
            Some(limit) => limit.min(self.max_range_size),
            None => self.max_range_size,
        };

        let mut range = KeyRange::new(request.start.as_str(), request.end.as_str());
        if let Some(cursor) = &request.cursor {
            range = range.after(cursor);
        }

        // One extra row tells us whether another page exists
        let wanted = limit + 1;
        let mut rows: Vec<Entry> = Vec::with_capacity(wanted.min(self.scan_chunk_size));

        while rows.len() < wanted {
            let ask = self.scan_chunk_size.min(wanted - rows.len());
            let chunk = self.store.scan_chunk(&range, ask)?;
            rows.extend(chunk.entries);

            match chunk.resume_after {
                Some(resume) => range = range.after(&resume),
                None => break,
            }
        }

        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more {
            rows.last().map(|e| e.key.clone())
        } else {
            None
        };

        tracing::debug!(
            "scan [{:?}, {:?}) cursor={:?} -> {} rows, has_more={}",
            request.start,
            request.end,
            request.cursor,
            rows.len(),
            has_more
        );

        Ok(ScanPage {
            entries: rows,
            next_cursor,
            has_more,
        })
    }

    pub fn max_range_size(&self) -> usize {
        self.max_range_size
    }
}
