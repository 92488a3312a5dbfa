//! Storage Manager
//!
//! Owns the set of SSTables in one directory. Tables are kept newest first so
//! a point lookup can stop at the first table holding the key.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, StratumError};
use crate::memtable::{MemTable, MemTableEntry};

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Merged table contents: `None` marks a tombstone
type MergedView = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

const TABLE_PREFIX: &str = "sstable_";
const TABLE_EXTENSION: &str = "sst";

fn table_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{:06}.{}", TABLE_PREFIX, id, TABLE_EXTENSION))
}

/// "sstable_000042.sst" → Some(42)
fn table_id(path: &Path) -> Option<u64> {
    if path.extension()? != TABLE_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(TABLE_PREFIX)?
        .parse()
        .ok()
}

/// Table ids found in `dir`, newest first
fn list_tables(dir: &Path) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        ids.extend(table_id(&path));
    }
    ids.sort_unstable_by(|a, b| b.cmp(a));
    Ok(ids)
}

/// Fold tables oldest → newest so newer records replace older ones
fn merge_tables(tables: &[Arc<SSTableReader>]) -> Result<MergedView> {
    let mut view = MergedView::new();
    for table in tables.iter().rev() {
        for record in table.iter()? {
            let (key, value) = record?;
            view.insert(key, value);
        }
    }
    Ok(view)
}

/// Make unlinks in `dir` durable before the next one is issued
fn sync_dir(dir: &Path) -> Result<()> {
    if cfg!(unix) {
        File::open(dir)?.sync_all()?;
    }
    Ok(())
}

/// SSTables of one directory.
///
/// Readers are shared: the lock only guards the list, so a caller can take
/// [`StorageManager::tables`] and read without holding it.
pub struct StorageManager {
    dir: PathBuf,
    /// Newest first
    tables: RwLock<Vec<Arc<SSTableReader>>>,
    next_id: AtomicU64,
}

impl StorageManager {
    /// Open every table in `path`, creating the directory if needed
    pub fn open(path: &Path, verify_checksums: bool) -> Result<Self> {
        fs::create_dir_all(path)?;

        let ids = list_tables(path)?;
        let tables = ids
            .iter()
            .map(|&id| SSTableReader::open(&table_path(path, id), verify_checksums).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        debug!(dir = %path.display(), tables = tables.len(), "storage opened");

        Ok(Self {
            dir: path.to_path_buf(),
            tables: RwLock::new(tables),
            next_id: AtomicU64::new(ids.first().map_or(1, |newest| newest + 1)),
        })
    }

    /// Newest record for `key`; `Ok(None)` when absent or deleted
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let tables = self.tables.read();
        for table in tables.iter().filter(|t| t.might_contain(key)) {
            match table.get(key) {
                Err(StratumError::KeyNotFound) => {}
                found => return found,
            }
        }
        Ok(None)
    }

    /// Write the memtable out as the newest table
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(StratumError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let records = memtable.iter().map(|(key, entry)| match entry {
            MemTableEntry::Value(v) => (key, Some(v)),
            MemTableEntry::Tombstone => (key, None),
        });
        let (table, reader) = self.write_table(records)?;
        self.tables.write().insert(0, Arc::new(reader));

        debug!(path = %table.path.display(), entries = table.entry_count, "memtable flushed");
        Ok(table)
    }

    /// Replace all tables with one merged table.
    ///
    /// Tombstones are dropped since nothing older remains beneath the result.
    /// The replaced files are unlinked oldest first, each unlink synced, so a
    /// table that survives an interrupted compaction is never older than a
    /// tombstone that was merged away. `None` when there are fewer than two
    /// tables.
    pub fn compact(&self) -> Result<Option<SSTable>> {
        let mut tables = self.tables.write();
        if tables.len() < 2 {
            return Ok(None);
        }

        let live = merge_tables(&tables)?
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, Some(v))));
        let (table, reader) = self.write_table(live)?;
        sync_dir(&self.dir)?;

        let replaced = std::mem::replace(&mut *tables, vec![Arc::new(reader)]);
        drop(tables);

        for old in replaced.iter().rev() {
            fs::remove_file(old.path()).map_err(|e| {
                StratumError::Storage(format!(
                    "failed to remove compacted SSTable {}: {}",
                    old.path().display(),
                    e
                ))
            })?;
            sync_dir(&self.dir)?;
        }

        info!(merged_tables = replaced.len(), entries = table.entry_count, "compaction finished");
        Ok(Some(table))
    }

    /// Current tables, newest first. The handles stay readable after a
    /// later flush or compaction.
    pub fn tables(&self) -> Vec<Arc<SSTableReader>> {
        self.tables.read().clone()
    }

    /// Move every table in `dir` that fails verification into `lost_dir`.
    ///
    /// Returns the new locations. Errors other than corruption abort.
    pub fn quarantine_corrupt(dir: &Path, lost_dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut moved = Vec::new();
        for id in list_tables(dir)? {
            let path = table_path(dir, id);
            let Err(e) = SSTableReader::open(&path, true) else {
                continue;
            };
            if !e.is_corruption() {
                return Err(e);
            }

            fs::create_dir_all(lost_dir)?;
            let target = lost_dir.join(path.file_name().unwrap_or_default());
            warn!(path = %path.display(), error = %e, "quarantining corrupt SSTable");
            fs::rename(&path, &target)?;
            moved.push(target);
        }
        Ok(moved)
    }

    pub fn sstable_count(&self) -> usize {
        self.tables.read().len()
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    /// Build a table from sorted records and open it (unverified, just written)
    fn write_table<I>(&self, records: I) -> Result<(SSTable, SSTableReader)>
    where
        I: IntoIterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let path = table_path(&self.dir, id);

        let mut builder = SSTableBuilder::new(&path)?;
        for (key, value) in records {
            match value {
                Some(v) => builder.add(&key, &v)?,
                None => builder.add_tombstone(&key)?,
            }
        }
        let table = builder.finish()?;
        let reader = SSTableReader::open(&path, false)?;
        Ok((table, reader))
    }
}
