//! MemTable
//!
//! Recent writes kept in a sorted map until they are flushed to an SSTable.
//! Deletes are stored as tombstones so they shadow older tables. A logged
//! operation, batches included, is applied under one write lock.

mod table;

pub use table::{MemTable, MemTableIterator};

/// Value slot for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemTableEntry {
    Value(Vec<u8>),
    Tombstone,
}

impl MemTableEntry {
    /// `None` for a tombstone
    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            MemTableEntry::Value(v) => Some(v),
            MemTableEntry::Tombstone => None,
        }
    }
}
