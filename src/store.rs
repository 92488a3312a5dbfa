//! Key-Value Store
//!
//! Query façade over a [`DatabaseHandle`]: point reads and writes, atomic
//! batches, and ordered range traversal.
//!
//! Every operation holds the handle's shared lock while it runs, opening the
//! store lazily if needed. Operations run concurrently with each other but
//! never alongside open/close/reset/destroy.
//!
//! ## Range Queries
//! Keys are ordered by their bytes. For a store holding `a`, `b`, `c`:
//! ```text
//! get_prev(b, 5)  → b, a      (key itself first, then strictly smaller, descending)
//! get_next(b, 5)  → c         (strictly greater, ascending)
//! earliest(2)     → a, b
//! latest(2)       → c, b
//! ```
//! A limit `<= 0` yields an empty result without touching the engine.

use std::sync::Arc;

use tracing::debug;

use crate::config::{Config, ReadErrorPolicy, WriteOptions};
use crate::engine::{Cursor, Engine, EngineFactory, LsmFactory, WriteBatch};
use crate::error::{Result, StratumError};
use crate::handle::DatabaseHandle;
use crate::retry::RetryPolicy;

/// A key and its value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Entry {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    fn from_slices(key: &[u8], value: &[u8]) -> Self {
        Self::new(key, value)
    }
}

impl From<(Vec<u8>, Vec<u8>)> for Entry {
    fn from((key, value): (Vec<u8>, Vec<u8>)) -> Self {
        Self { key, value }
    }
}

/// Result of a point read that keeps absence and failure apart
#[derive(Debug)]
pub enum ReadOutcome {
    Found(Vec<u8>),
    Absent,
    Failed(StratumError),
}

impl ReadOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ReadOutcome::Found(_))
    }

    /// `Found` → `Ok(Some)`, `Absent` → `Ok(None)`, `Failed` → `Err`
    pub fn into_result(self) -> Result<Option<Vec<u8>>> {
        match self {
            ReadOutcome::Found(value) => Ok(Some(value)),
            ReadOutcome::Absent => Ok(None),
            ReadOutcome::Failed(e) => Err(e),
        }
    }
}

/// Query façade over one store
pub struct KeyValueStore<F: EngineFactory = LsmFactory> {
    handle: Arc<DatabaseHandle<F>>,
    read_error_policy: ReadErrorPolicy,
    batch_retry: RetryPolicy,
}

impl<F: EngineFactory> Clone for KeyValueStore<F> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            read_error_policy: self.read_error_policy,
            batch_retry: self.batch_retry,
        }
    }
}

impl KeyValueStore<LsmFactory> {
    /// Store over the built-in engine, with location, options and policies
    /// taken from `config`
    pub fn from_config(config: &Config) -> Self {
        Self::with_policies(
            Arc::new(DatabaseHandle::from_config(config)),
            config.read_error_policy,
            config.batch_retry,
        )
    }
}

impl<F: EngineFactory> KeyValueStore<F> {
    /// Store with default policies (masked read errors, one batch retry)
    pub fn new(handle: Arc<DatabaseHandle<F>>) -> Self {
        Self::with_policies(handle, ReadErrorPolicy::default(), RetryPolicy::default())
    }

    pub fn with_policies(
        handle: Arc<DatabaseHandle<F>>,
        read_error_policy: ReadErrorPolicy,
        batch_retry: RetryPolicy,
    ) -> Self {
        Self {
            handle,
            read_error_policy,
            batch_retry,
        }
    }

    pub fn handle(&self) -> &Arc<DatabaseHandle<F>> {
        &self.handle
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Point read reporting found / absent / failed separately
    pub fn read(&self, key: &[u8]) -> ReadOutcome {
        let engine = match self.handle.engine() {
            Ok(engine) => engine,
            Err(e) => return ReadOutcome::Failed(e),
        };
        match engine.get(key) {
            Ok(Some(value)) => ReadOutcome::Found(value),
            Ok(None) => ReadOutcome::Absent,
            Err(e) => ReadOutcome::Failed(e),
        }
    }

    /// Point read.
    ///
    /// Under [`ReadErrorPolicy::MaskAsAbsent`] an engine read failure is
    /// logged and reported as `Ok(None)`. Failing to open the store is always
    /// returned as an error.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let engine = self.handle.engine()?;
        match engine.get(key) {
            Ok(value) => Ok(value),
            Err(e) => match self.read_error_policy {
                ReadErrorPolicy::MaskAsAbsent => {
                    debug!(error = %e, "read failed, reporting key as absent");
                    Ok(None)
                }
                ReadErrorPolicy::Propagate => Err(e),
            },
        }
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put_with(key, value, &WriteOptions::default())
    }

    pub fn put_with(&self, key: &[u8], value: &[u8], options: &WriteOptions) -> Result<()> {
        self.handle.engine()?.put(key, value, options)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.delete_with(key, &WriteOptions::default())
    }

    pub fn delete_with(&self, key: &[u8], options: &WriteOptions) -> Result<()> {
        self.handle.engine()?.delete(key, options)
    }

    // =========================================================================
    // Batch Mutation
    // =========================================================================

    /// Apply `key → Option<value>` rows atomically; `None` deletes the key.
    ///
    /// A failed write is retried from scratch per the store's retry policy;
    /// once attempts run out [`StratumError::RetriesExhausted`] is returned.
    pub fn update_by_batch<I, K, V>(&self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        self.update_by_batch_with(rows, &WriteOptions::default())
    }

    pub fn update_by_batch_with<I, K, V>(&self, rows: I, options: &WriteOptions) -> Result<()>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let batch = WriteBatch::from_rows(rows);
        let engine = self.handle.engine()?;
        self.batch_retry.run(|attempt| {
            if attempt > 1 {
                debug!(attempt, ops = batch.len(), "retrying batch write");
            }
            engine.write(&batch, options)
        })
    }

    // =========================================================================
    // Range Queries
    // =========================================================================

    /// The entry at `key` (if any) followed by smaller keys, descending
    pub fn get_prev(&self, key: &[u8], limit: i64) -> Result<Vec<Entry>> {
        self.scan(Traversal::Prev(key), limit, Entry::from_slices)
    }

    /// Values of [`get_prev`](Self::get_prev), in the same order
    pub fn get_values_prev(&self, key: &[u8], limit: i64) -> Result<Vec<Vec<u8>>> {
        self.scan(Traversal::Prev(key), limit, |_, v| v.to_vec())
    }

    /// Entries with keys strictly greater than `key`, ascending
    pub fn get_next(&self, key: &[u8], limit: i64) -> Result<Vec<Entry>> {
        self.scan(Traversal::Next(key), limit, Entry::from_slices)
    }

    /// Values of [`get_next`](Self::get_next), in the same order
    pub fn get_values_next(&self, key: &[u8], limit: i64) -> Result<Vec<Vec<u8>>> {
        self.scan(Traversal::Next(key), limit, |_, v| v.to_vec())
    }

    /// Values from the smallest key forward
    pub fn get_values_earliest(&self, limit: i64) -> Result<Vec<Vec<u8>>> {
        self.scan(Traversal::Earliest, limit, |_, v| v.to_vec())
    }

    /// Values from the largest key backward
    pub fn get_values_latest(&self, limit: i64) -> Result<Vec<Vec<u8>>> {
        self.scan(Traversal::Latest, limit, |_, v| v.to_vec())
    }

    /// Number of entries, by a full forward scan
    pub fn get_total(&self) -> Result<u64> {
        let engine = self.handle.engine()?;
        let mut cursor = engine.cursor()?;

        let mut total = 0;
        cursor.seek_to_first();
        while cursor.has_next() {
            total += 1;
            cursor.next();
        }
        match cursor.take_error() {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    fn scan<T>(
        &self,
        traversal: Traversal<'_>,
        limit: i64,
        mut map: impl FnMut(&[u8], &[u8]) -> T,
    ) -> Result<Vec<T>> {
        let limit = match usize::try_from(limit) {
            Ok(n) if n > 0 => n,
            _ => return Ok(Vec::new()),
        };

        let engine = self.handle.engine()?;
        let mut cursor = engine.cursor()?;

        let mut out = Vec::new();
        traversal.walk(&mut cursor, limit, &mut |k, v| out.push(map(k, v)));
        match cursor.take_error() {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }
}

/// Where a range query starts and which way it walks
#[derive(Debug, Clone, Copy)]
enum Traversal<'k> {
    Prev(&'k [u8]),
    Next(&'k [u8]),
    Earliest,
    Latest,
}

impl Traversal<'_> {
    fn walk<C: Cursor>(self, cursor: &mut C, limit: usize, emit: &mut dyn FnMut(&[u8], &[u8])) {
        match self {
            Traversal::Prev(key) => {
                cursor.seek(key);
                let mut taken = 0;
                if let Some((k, v)) = cursor.peek_next() {
                    if k == key {
                        emit(k, v);
                        taken = 1;
                    }
                }
                walk_backward(cursor, limit - taken, emit);
            }
            Traversal::Next(key) => {
                cursor.seek(key);
                if matches!(cursor.peek_next(), Some((k, _)) if k == key) {
                    cursor.next();
                }
                walk_forward(cursor, limit, emit);
            }
            Traversal::Earliest => {
                cursor.seek_to_first();
                walk_forward(cursor, limit, emit);
            }
            Traversal::Latest => {
                cursor.seek_to_last();
                let mut taken = 0;
                if let Some((k, v)) = cursor.peek_next() {
                    emit(k, v);
                    taken = 1;
                }
                walk_backward(cursor, limit - taken, emit);
            }
        }
    }
}

fn walk_forward<C: Cursor>(cursor: &mut C, limit: usize, emit: &mut dyn FnMut(&[u8], &[u8])) {
    for _ in 0..limit {
        match cursor.peek_next() {
            Some((k, v)) => emit(k, v),
            None => break,
        }
        cursor.next();
    }
}

fn walk_backward<C: Cursor>(cursor: &mut C, limit: usize, emit: &mut dyn FnMut(&[u8], &[u8])) {
    for _ in 0..limit {
        match cursor.peek_prev() {
            Some((k, v)) => emit(k, v),
            None => break,
        }
        cursor.prev();
    }
}
