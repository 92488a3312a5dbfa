//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::wal::Operation;
use super::MemTableEntry;

#[derive(Default)]
struct Inner {
    data: BTreeMap<Vec<u8>, MemTableEntry>,
    /// Approximate size in bytes (keys + live values)
    size: usize,
}

impl Inner {
    fn insert(&mut self, key: Vec<u8>, entry: MemTableEntry) {
        let key_len = key.len();
        let value_len = entry_len(&entry);
        match self.data.insert(key, entry) {
            // key bytes were already counted
            Some(old) => self.size = self.size - entry_len(&old) + value_len,
            None => self.size += key_len + value_len,
        }
    }

    fn apply(&mut self, operation: &Operation) {
        match operation {
            Operation::Put { key, value } => {
                self.insert(key.clone(), MemTableEntry::Value(value.clone()))
            }
            Operation::Delete { key } => self.insert(key.clone(), MemTableEntry::Tombstone),
            Operation::Batch(ops) => ops.iter().for_each(|op| self.apply(op)),
        }
    }
}

fn entry_len(entry: &MemTableEntry) -> usize {
    match entry {
        MemTableEntry::Value(v) => v.len(),
        MemTableEntry::Tombstone => 0,
    }
}

/// In-memory table for recent writes
#[derive(Default)]
pub struct MemTable {
    inner: RwLock<Inner>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for a key (read lock)
    ///
    /// `Some(Tombstone)` means the key was deleted here and older tables must
    /// not be consulted.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.inner.read().data.get(key).cloned()
    }

    /// Apply a logged operation under a single write lock, returning the new size
    pub fn apply(&self, operation: &Operation) -> usize {
        let mut inner = self.inner.write();
        inner.apply(operation);
        inner.size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Copy of all entries, tombstones included
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, MemTableEntry> {
        self.inner.read().data.clone()
    }

    /// Snapshot iterator over all entries in sorted key order
    pub fn iter(&self) -> MemTableIterator {
        MemTableIterator {
            entries: self.snapshot().into_iter(),
        }
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.data.clear();
        inner.size = 0;
    }
}

/// Iterator over a MemTable snapshot
pub struct MemTableIterator {
    entries: std::collections::btree_map::IntoIter<Vec<u8>, MemTableEntry>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }
}
