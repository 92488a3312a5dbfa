//! # StratumKV
//!
//! A lifecycle and query layer over an embedded, ordered key-value engine:
//! - Lazy open with one-shot corruption repair
//! - Close / reset / destroy serialized against in-flight queries
//! - Point reads and writes, atomic batches with bounded retry
//! - Ordered range queries (previous, next, earliest, latest, total)
//! - Built-in LSM engine: WAL + MemTable + SSTables
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      KeyValueStore                           │
//! │        (point ops, batches, range queries, policies)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  shared lock per operation
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    DatabaseHandle                            │
//! │      (Closed ⇄ Open, repair on corruption, RwLock)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Engine / EngineFactory traits
//!          ┌────────────┴────────────┐
//!          │        LsmEngine        │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use stratumkv::{DatabaseHandle, KeyValueStore};
//!
//! # fn main() -> stratumkv::Result<()> {
//! let handle = Arc::new(DatabaseHandle::new("/var/lib/app", "database", "blocks"));
//! let store = KeyValueStore::new(handle);
//!
//! store.put(b"a", b"1")?;
//! store.update_by_batch([(b"b".to_vec(), Some(b"2".to_vec())), (b"a".to_vec(), None)])?;
//! assert_eq!(store.get_values_earliest(10)?, vec![b"2".to_vec()]);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod retry;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

pub mod handle;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StratumError};
pub use config::{Config, Options, ReadErrorPolicy, WriteOptions};
pub use retry::RetryPolicy;
pub use engine::{Cursor, Engine, EngineFactory, LsmEngine, LsmFactory, WriteBatch};
pub use handle::{DatabaseHandle, StoreLocation};
pub use store::{Entry, KeyValueStore, ReadOutcome};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StratumKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
