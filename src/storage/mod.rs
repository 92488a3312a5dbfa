//! Storage Module
//!
//! Persistent storage layer using immutable sorted tables (SSTables).
//!
//! ## Responsibilities
//! - Persist data to disk in sorted format
//! - Point lookups through in-memory indexes
//! - Checksum verification of table data
//! - Full compaction when too many tables accumulate

mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::StorageManager;
