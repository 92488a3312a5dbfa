//! Fault-injecting engine wrappers shared by the handle and store tests
//!
//! [`FlakyFactory`] and [`FlakyEngine`] delegate to the built-in LSM engine
//! and fail on demand according to a shared [`Faults`] record. Each fault
//! counter is decremented once per injected failure.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use stratumkv::config::{Options, WriteOptions};
use stratumkv::engine::MergeCursor;
use stratumkv::{
    DatabaseHandle, Engine, EngineFactory, LsmEngine, LsmFactory, Result, StoreLocation,
    StratumError, WriteBatch,
};
use tempfile::TempDir;

/// Fault switches and call counters
#[derive(Debug, Default)]
pub struct Faults {
    /// Opens still to fail with a corruption error
    pub corrupt_opens: AtomicU32,
    /// Opens still to fail with a non-corruption error
    pub failing_opens: AtomicU32,
    /// Batch writes still to fail
    pub failing_writes: AtomicU32,
    /// Point reads fail while set
    pub failing_reads: AtomicBool,
    /// Engine close fails while set
    pub failing_close: AtomicBool,

    pub opens: AtomicU32,
    pub repairs: AtomicU32,
    pub closes: AtomicU32,
    pub write_attempts: AtomicU32,
}

impl Faults {
    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

/// Consume one pending failure, if any
fn take(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn injected(what: &str) -> StratumError {
    StratumError::Storage(format!("injected {} failure", what))
}

#[derive(Debug, Default, Clone)]
pub struct FlakyFactory {
    pub faults: Arc<Faults>,
}

impl EngineFactory for FlakyFactory {
    type Engine = FlakyEngine;

    fn open(&self, path: &Path, options: &Options) -> Result<FlakyEngine> {
        self.faults.opens.fetch_add(1, Ordering::SeqCst);
        if take(&self.faults.corrupt_opens) {
            return Err(StratumError::Corruption("injected corruption".to_string()));
        }
        if take(&self.faults.failing_opens) {
            return Err(injected("open"));
        }
        Ok(FlakyEngine {
            inner: LsmFactory.open(path, options)?,
            faults: Arc::clone(&self.faults),
        })
    }

    fn repair(&self, path: &Path, options: &Options) -> Result<()> {
        self.faults.repairs.fetch_add(1, Ordering::SeqCst);
        if path.is_dir() {
            LsmFactory.repair(path, options)
        } else {
            Ok(())
        }
    }

    fn destroy(&self, path: &Path, options: &Options) -> Result<()> {
        LsmFactory.destroy(path, options)
    }
}

pub struct FlakyEngine {
    inner: LsmEngine,
    faults: Arc<Faults>,
}

impl Engine for FlakyEngine {
    type Cursor<'a> = MergeCursor;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.faults.failing_reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8], options: &WriteOptions) -> Result<()> {
        self.inner.put(key, value, options)
    }

    fn delete(&self, key: &[u8], options: &WriteOptions) -> Result<()> {
        self.inner.delete(key, options)
    }

    fn write(&self, batch: &WriteBatch, options: &WriteOptions) -> Result<()> {
        self.faults.write_attempts.fetch_add(1, Ordering::SeqCst);
        if take(&self.faults.failing_writes) {
            return Err(injected("write"));
        }
        self.inner.write(batch, options)
    }

    fn cursor(&self) -> Result<MergeCursor> {
        self.inner.cursor()
    }

    fn close(self) -> Result<()> {
        self.faults.closes.fetch_add(1, Ordering::SeqCst);
        let result = self.inner.close();
        if self.faults.failing_close.load(Ordering::SeqCst) {
            return Err(injected("close"));
        }
        result
    }
}

/// Closed handle over a [`FlakyFactory`] in a fresh temp directory
pub fn flaky_handle() -> (TempDir, Arc<Faults>, Arc<DatabaseHandle<FlakyFactory>>) {
    let temp_dir = TempDir::new().unwrap();
    let factory = FlakyFactory::default();
    let faults = Arc::clone(&factory.faults);
    let handle = DatabaseHandle::with_factory(
        StoreLocation::new(temp_dir.path(), "database", "test"),
        Options::default(),
        factory,
    );
    (temp_dir, faults, Arc::new(handle))
}

/// Closed handle over the built-in engine in a fresh temp directory
pub fn lsm_handle() -> (TempDir, Arc<DatabaseHandle>) {
    let temp_dir = TempDir::new().unwrap();
    let handle = DatabaseHandle::new(temp_dir.path(), "database", "test");
    (temp_dir, Arc::new(handle))
}
