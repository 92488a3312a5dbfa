//! Merging cursor
//!
//! A [`Cursor`] over several sorted sources at once: a copy of the memtable
//! and the SSTables that existed when the cursor was created. Each move asks
//! every source for its nearest key in the walking direction and resolves
//! that key newest-source-first, skipping tombstones. Only the entries on
//! either side of the position are held in memory.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use crate::error::{Result, StratumError};
use crate::memtable::MemTableEntry;
use crate::storage::SSTableReader;

use super::Cursor;

type KeyValue = (Vec<u8>, Vec<u8>);

/// One sorted input of a [`MergeCursor`]
pub(crate) enum Source {
    Memory(BTreeMap<Vec<u8>, MemTableEntry>),
    Table(Arc<SSTableReader>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

impl Source {
    /// Nearest key strictly past `from` (or at it, when included)
    fn neighbor(&self, from: Bound<&[u8]>, direction: Direction) -> Option<&[u8]> {
        let range = match direction {
            Direction::Forward => (from, Bound::Unbounded),
            Direction::Backward => (Bound::Unbounded, from),
        };
        match self {
            Source::Memory(map) => {
                let mut keys = map.range::<[u8], _>(range).map(|(k, _)| k.as_slice());
                match direction {
                    Direction::Forward => keys.next(),
                    Direction::Backward => keys.next_back(),
                }
            }
            Source::Table(table) => {
                let mut keys = table.keys(range);
                match direction {
                    Direction::Forward => keys.next(),
                    Direction::Backward => keys.next_back(),
                }
            }
        }
    }

    /// `None` when this source has no record for `key`, `Some(None)` for a
    /// tombstone
    fn lookup(&self, key: &[u8]) -> Result<Option<Option<Vec<u8>>>> {
        match self {
            Source::Memory(map) => Ok(map.get(key).cloned().map(MemTableEntry::into_value)),
            Source::Table(table) => match table.get(key) {
                Ok(value) => Ok(Some(value)),
                Err(StratumError::KeyNotFound) => Ok(None),
                Err(e) => Err(e),
            },
        }
    }
}

/// Cursor merging sources ordered newest first.
///
/// The position is implied by the cached neighbors: it lies just before
/// `next`, or just after `prev` when there is no `next`. A read failure ends
/// the walk and is kept for [`Cursor::take_error`].
pub struct MergeCursor {
    sources: Vec<Source>,
    next: Option<KeyValue>,
    prev: Option<KeyValue>,
    error: Option<StratumError>,
}

impl MergeCursor {
    /// Cursor over `sources`, newest first, positioned before the first entry
    pub(crate) fn new(sources: Vec<Source>) -> Self {
        let mut cursor = Self {
            sources,
            next: None,
            prev: None,
            error: None,
        };
        cursor.seek_to_first();
        cursor
    }

    fn find(&mut self, from: Bound<&[u8]>, direction: Direction) -> Option<KeyValue> {
        match self.resolve(from, direction) {
            Ok(found) => found,
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    /// First live entry past `from` in `direction`
    fn resolve(&self, from: Bound<&[u8]>, direction: Direction) -> Result<Option<KeyValue>> {
        let mut candidate = self.nearest(from, direction);

        while let Some(key) = candidate {
            for source in &self.sources {
                match source.lookup(&key)? {
                    Some(Some(value)) => return Ok(Some((key, value))),
                    Some(None) => break,
                    None => continue,
                }
            }
            candidate = self.nearest(Bound::Excluded(key.as_slice()), direction);
        }
        Ok(None)
    }

    /// Closest key past `from` over all sources, tombstones included
    fn nearest(&self, from: Bound<&[u8]>, direction: Direction) -> Option<Vec<u8>> {
        let keys = self.sources.iter().filter_map(|s| s.neighbor(from, direction));
        let best = match direction {
            Direction::Forward => keys.min(),
            Direction::Backward => keys.max(),
        };
        best.map(<[u8]>::to_vec)
    }
}

impl Cursor for MergeCursor {
    fn seek(&mut self, key: &[u8]) {
        self.next = self.find(Bound::Included(key), Direction::Forward);
        self.prev = self.find(Bound::Excluded(key), Direction::Backward);
    }

    fn seek_to_first(&mut self) {
        self.next = self.find(Bound::Unbounded, Direction::Forward);
        self.prev = None;
    }

    fn seek_to_last(&mut self) {
        self.next = self.find(Bound::Unbounded, Direction::Backward);
        let last = self.next.as_ref().map(|(k, _)| k.clone());
        self.prev = match last {
            Some(key) => self.find(Bound::Excluded(key.as_slice()), Direction::Backward),
            None => None,
        };
    }

    fn has_next(&self) -> bool {
        self.next.is_some()
    }

    fn has_prev(&self) -> bool {
        self.prev.is_some()
    }

    fn peek_next(&self) -> Option<(&[u8], &[u8])> {
        self.next.as_ref().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    fn peek_prev(&self) -> Option<(&[u8], &[u8])> {
        self.prev.as_ref().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    fn next(&mut self) {
        if let Some(current) = self.next.take() {
            self.next = self.find(Bound::Excluded(current.0.as_slice()), Direction::Forward);
            self.prev = Some(current);
        }
    }

    fn prev(&mut self) {
        if let Some(current) = self.prev.take() {
            self.prev = self.find(Bound::Excluded(current.0.as_slice()), Direction::Backward);
            self.next = Some(current);
        }
    }

    fn take_error(&mut self) -> Option<StratumError> {
        self.error.take()
    }
}
