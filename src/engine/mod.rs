//! Engine Module
//!
//! The contract between the lifecycle/query layer and an ordered key-value
//! storage engine, plus the built-in LSM implementation.
//!
//! ## Contract
//! - [`EngineFactory`]: path-level primitives (open, repair, destroy)
//! - [`Engine`]: an open instance (point ops, atomic batch write, cursors, close)
//! - [`Cursor`]: bidirectional traversal over the byte-ordered keyspace
//!
//! Keys are ordered lexicographically by their bytes.

mod batch;
mod cursor;
mod lsm;

use std::path::Path;

use crate::config::{Options, WriteOptions};
use crate::error::{Result, StratumError};

pub use batch::{BatchOp, WriteBatch};
pub use cursor::MergeCursor;
pub(crate) use cursor::Source;
pub use lsm::{LsmEngine, LsmFactory};

/// An open, ordered key-value engine instance
pub trait Engine: Send + Sync {
    /// Cursor type; borrowed from the engine for the duration of one query
    type Cursor<'a>: Cursor
    where
        Self: 'a;

    /// Point read; `Ok(None)` when the key is absent
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8], options: &WriteOptions) -> Result<()>;

    fn delete(&self, key: &[u8], options: &WriteOptions) -> Result<()>;

    /// Apply every operation of `batch` atomically
    fn write(&self, batch: &WriteBatch, options: &WriteOptions) -> Result<()>;

    /// New cursor, initially positioned before the first entry
    fn cursor(&self) -> Result<Self::Cursor<'_>>;

    /// Release the instance, persisting buffered state
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Path-level engine primitives
pub trait EngineFactory: Send + Sync {
    type Engine: Engine;

    /// Open (or create, per `options`) the store at `path`.
    ///
    /// Damaged on-disk data must be reported with an error for which
    /// [`crate::StratumError::is_corruption`] is true.
    fn open(&self, path: &Path, options: &Options) -> Result<Self::Engine>;

    /// Salvage what can be read from a damaged store at `path`
    fn repair(&self, path: &Path, options: &Options) -> Result<()>;

    /// Delete the store at `path`
    fn destroy(&self, path: &Path, options: &Options) -> Result<()>;
}

/// Bidirectional cursor over the ordered keyspace.
///
/// A cursor sits *between* entries: `peek_next` is the entry after the
/// position, `peek_prev` the entry before it. Dropping the cursor releases it.
pub trait Cursor {
    /// Position before the first entry whose key is `>= key`
    fn seek(&mut self, key: &[u8]);

    /// Position before the smallest entry
    fn seek_to_first(&mut self);

    /// Position before the largest entry, so `peek_next` yields it
    fn seek_to_last(&mut self);

    fn has_next(&self) -> bool;

    fn has_prev(&self) -> bool;

    fn peek_next(&self) -> Option<(&[u8], &[u8])>;

    fn peek_prev(&self) -> Option<(&[u8], &[u8])>;

    /// Step forward over one entry (no-op at the end)
    fn next(&mut self);

    /// Step backward over one entry (no-op at the start)
    fn prev(&mut self);

    /// Error that ended the walk early, if any. A cursor that fails to read
    /// behaves as if it reached the end; callers check this once done.
    fn take_error(&mut self) -> Option<StratumError> {
        None
    }
}
