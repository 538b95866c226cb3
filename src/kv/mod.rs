//! Key-Value Core
//!
//! The local, non-replicated half of every operation.
//!
//! - [`VersionEngine`]: single-key upsert with a per-key version counter
//! - [`RangeScanner`]: cursor-paged ordered reads in bounded chunks
//! - [`BatchProcessor`]: bulk upserts committed chunk by chunk

mod batch;
mod scan;
mod version;

pub use batch::{BatchItem, BatchOutcome, BatchProcessor};
pub use scan::{RangeScanner, ScanPage, ScanRequest};
pub use version::{PutOutcome, VersionEngine};
