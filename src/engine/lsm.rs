//! Built-in LSM engine
//!
//! WAL + MemTable + SSTables behind the [`Engine`] contract.
//!
//! ## Directory Layout
//! ```text
//! {path}/
//!   ├── wal.log          (write-ahead log)
//!   ├── sstables/        (SSTable files)
//!   └── lost/            (tables quarantined by repair)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{CompressionType, Options, WriteOptions};
use crate::error::{Result, StratumError};
use crate::memtable::MemTable;
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

use super::{Engine, EngineFactory, MergeCursor, Source, WriteBatch};

const WAL_FILENAME: &str = "wal.log";
const SSTABLE_DIR: &str = "sstables";
const LOST_DIR: &str = "lost";

/// The built-in storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/write/flush): Serialized by `write_lock`
///   - Must acquire: write_lock → WAL → memtable → storage
/// - **Reads** (get): no write_lock; memtable first, then storage
/// - **Cursors**: the memtable copy and the table handles are taken together
///   under `write_lock`, so no flush can move entries between them; the walk
///   itself runs without any engine lock
pub struct LsmEngine {
    options: Options,

    data_dir: PathBuf,

    /// Write-ahead log for durability
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl LsmEngine {
    /// Open or create an engine at `path`
    ///
    /// On startup:
    /// 1. Create the directory (if allowed by `create_if_missing`)
    /// 2. Load existing SSTables (verifying checksums if asked)
    /// 3. Check the WAL for corruption (with `paranoid_checks`)
    /// 4. Replay the WAL, flush it to an SSTable, truncate it
    pub fn open(path: &Path, options: Options) -> Result<Self> {
        options.validate()?;
        if options.compression != CompressionType::None {
            warn!(compression = ?options.compression, "compression is not supported, storing uncompressed");
        }
        if !path.exists() && !options.create_if_missing {
            return Err(StratumError::InvalidArgument(format!(
                "{} does not exist (create_if_missing is false)",
                path.display()
            )));
        }
        fs::create_dir_all(path)?;

        let storage = StorageManager::open(&path.join(SSTABLE_DIR), options.verify_checksums)?;
        let memtable = MemTable::new();
        let wal_path = path.join(WAL_FILENAME);

        if wal_path.exists() {
            if options.paranoid_checks {
                let check = WalRecovery::verify(&wal_path)?;
                if check.has_corruption() {
                    return Err(StratumError::WalCorruption(format!(
                        "{}: corrupted record after lsn {}",
                        wal_path.display(),
                        check.last_lsn
                    )));
                }
            }

            let (entries, result) = WalRecovery::recover(&wal_path)?;
            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                info!(
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    "WAL recovery"
                );
            }
            for entry in &entries {
                memtable.apply(&entry.operation);
            }
        }

        let mut wal = WalWriter::open(&wal_path, options.wal_sync_strategy)?;

        // Make recovered data durable in an SSTable before dropping the log
        if !memtable.is_empty() {
            debug!(entries = memtable.entry_count(), "flushing recovered entries");
            storage.flush(&memtable)?;
            memtable.clear();
            wal.truncate()?;
        }

        Ok(Self {
            options,
            data_dir: path.to_path_buf(),
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Salvage a damaged store.
    ///
    /// SSTables that fail verification are moved to `lost/`; the WAL is
    /// replayed up to its first bad record, flushed, and truncated.
    pub fn repair(path: &Path, options: &Options) -> Result<()> {
        if !path.is_dir() {
            return Err(StratumError::InvalidArgument(format!(
                "no store to repair at {}",
                path.display()
            )));
        }

        let storage_dir = path.join(SSTABLE_DIR);
        let quarantined = StorageManager::quarantine_corrupt(&storage_dir, &path.join(LOST_DIR))?;

        let wal_path = path.join(WAL_FILENAME);
        let mut salvaged = 0;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;
            if !entries.is_empty() {
                let memtable = MemTable::new();
                for entry in &entries {
                    memtable.apply(&entry.operation);
                }
                StorageManager::open(&storage_dir, false)?.flush(&memtable)?;
                salvaged = result.entries_recovered;
            }
            WalWriter::open(&wal_path, options.wal_sync_strategy)?.truncate()?;
        }

        info!(
            path = %path.display(),
            quarantined = quarantined.len(),
            wal_entries = salvaged,
            "repair finished"
        );
        Ok(())
    }

    /// Delete the engine files at `path`, then the directory if it is empty.
    ///
    /// A missing path is not an error.
    pub fn destroy(path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let wal_path = path.join(WAL_FILENAME);
        if wal_path.exists() {
            fs::remove_file(&wal_path)?;
        }
        for dir in [SSTABLE_DIR, LOST_DIR] {
            let dir = path.join(dir);
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }

        if fs::read_dir(path)?.next().is_none() {
            fs::remove_dir(path)?;
        } else {
            warn!(path = %path.display(), "store directory holds foreign files, left in place");
        }
        Ok(())
    }

    /// Flush memtable to disk regardless of its size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Merge all SSTables into one
    pub fn compact(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.storage.compact().map(|_| ())
    }

    /// Log then apply a mutation (caller must not hold `write_lock`)
    fn log_and_apply(&self, operation: Operation, options: &WriteOptions) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append_with(operation.clone(), options.sync)?;
        let new_size = self.memtable.apply(&operation);

        if new_size >= self.options.write_buffer_size {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Called with write lock held
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        self.wal.lock().truncate()?;

        if self.storage.sstable_count() > self.options.max_open_files {
            self.storage.compact()?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }
}

impl Engine for LsmEngine {
    type Cursor<'a> = MergeCursor;

    /// Search order: MemTable (most recent), then SSTables newest → oldest
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.into_value());
        }
        self.storage.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8], options: &WriteOptions) -> Result<()> {
        self.log_and_apply(
            Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            },
            options,
        )
    }

    fn delete(&self, key: &[u8], options: &WriteOptions) -> Result<()> {
        self.log_and_apply(Operation::Delete { key: key.to_vec() }, options)
    }

    /// One WAL record, applied to the memtable under one lock
    fn write(&self, batch: &WriteBatch, options: &WriteOptions) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.log_and_apply(batch.to_operation(), options)
    }

    /// Merges a memtable copy with the current tables, newest first
    fn cursor(&self) -> Result<MergeCursor> {
        let sources = {
            let _write_guard = self.write_lock.lock();
            let mut sources = vec![Source::Memory(self.memtable.snapshot())];
            sources.extend(self.storage.tables().into_iter().map(Source::Table));
            sources
        };
        Ok(MergeCursor::new(sources))
    }

    /// Flushes pending data and syncs the WAL
    fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;
        debug!(path = %self.data_dir.display(), "engine closed");
        Ok(())
    }
}

/// [`EngineFactory`] for [`LsmEngine`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LsmFactory;

impl EngineFactory for LsmFactory {
    type Engine = LsmEngine;

    fn open(&self, path: &Path, options: &Options) -> Result<LsmEngine> {
        LsmEngine::open(path, options.clone())
    }

    fn repair(&self, path: &Path, options: &Options) -> Result<()> {
        LsmEngine::repair(path, options)
    }

    fn destroy(&self, path: &Path, _options: &Options) -> Result<()> {
        LsmEngine::destroy(path)
    }
}
