//! Configuration for StratumKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StratumError};
use crate::retry::RetryPolicy;

const MIB: usize = 1024 * 1024;

/// Main configuration for a StratumKV store
///
/// The on-disk location is `{parent_dir}/{directory}/{name}`.
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Location
    // -------------------------------------------------------------------------
    /// Parent directory shared by all stores of the process
    pub parent_dir: PathBuf,

    /// Subdirectory under `parent_dir`
    pub directory: PathBuf,

    /// Store name (the leaf directory holding the engine files)
    pub name: String,

    // -------------------------------------------------------------------------
    // Engine Configuration
    // -------------------------------------------------------------------------
    /// Options handed to the engine on open/repair/destroy
    pub options: Options,

    // -------------------------------------------------------------------------
    // Query Layer Configuration
    // -------------------------------------------------------------------------
    /// What `get` does when the engine fails to read
    pub read_error_policy: ReadErrorPolicy,

    /// Retry policy for atomic batch writes
    pub batch_retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parent_dir: PathBuf::from("./stratumkv_data"),
            directory: PathBuf::from("database"),
            name: "default".to_string(),
            options: Options::default(),
            read_error_policy: ReadErrorPolicy::default(),
            batch_retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the parent directory
    pub fn parent_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.parent_dir = path.into();
        self
    }

    /// Set the subdirectory under the parent directory
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.directory = path.into();
        self
    }

    /// Set the store name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the engine options
    pub fn options(mut self, options: Options) -> Self {
        self.config.options = options;
        self
    }

    /// Set how point-read failures are reported
    pub fn read_error_policy(mut self, policy: ReadErrorPolicy) -> Self {
        self.config.read_error_policy = policy;
        self
    }

    /// Set the retry policy for batch writes
    pub fn batch_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.batch_retry = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Engine Options
// =============================================================================

/// Block compression requested from the engine.
///
/// A request only: engines without compression store blocks uncompressed.
/// The built-in LSM engine never compresses and logs a warning when
/// `Snappy` is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    #[default]
    None,
    /// Ignored by the built-in engine
    Snappy,
}

/// Engine tuning options, passed through on open, repair and destroy.
///
/// Engines honor what they support. The built-in LSM engine uses
/// `create_if_missing`, `max_open_files` (compaction trigger),
/// `write_buffer_size` (memtable flush threshold), `paranoid_checks`,
/// `verify_checksums` and `wal_sync_strategy`; compression, cache and block
/// size are advisory.
#[derive(Debug, Clone)]
pub struct Options {
    /// Create the store directory when it does not exist
    pub create_if_missing: bool,

    /// Block compression
    pub compression: CompressionType,

    /// Block cache size in bytes (0 disables the cache)
    pub cache_size: usize,

    /// Upper bound on table files kept open at once
    pub max_open_files: usize,

    /// Target size of a data block in bytes
    pub block_size: usize,

    /// Bytes buffered in memory before a flush to a table file
    pub write_buffer_size: usize,

    /// Fail open on any detected inconsistency instead of skipping it
    pub paranoid_checks: bool,

    /// Verify checksums of table data when reading it
    pub verify_checksums: bool,

    /// How often the write-ahead log is fsynced
    pub wal_sync_strategy: WalSyncStrategy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            compression: CompressionType::None,
            cache_size: 0,
            max_open_files: 32,
            block_size: 10 * MIB,
            write_buffer_size: 10 * MIB,
            paranoid_checks: true,
            verify_checksums: true,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
        }
    }
}

impl Options {
    /// Create a new options builder
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Reject settings no engine can run with
    pub fn validate(&self) -> Result<()> {
        if self.write_buffer_size == 0 {
            return Err(StratumError::Config("write_buffer_size must be positive".into()));
        }
        if self.max_open_files == 0 {
            return Err(StratumError::Config("max_open_files must be positive".into()));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(StratumError::Config("WAL sync interval must be positive".into()));
        }
        Ok(())
    }
}

/// Builder for Options
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.options.create_if_missing = value;
        self
    }

    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.options.compression = compression;
        self
    }

    pub fn cache_size(mut self, bytes: usize) -> Self {
        self.options.cache_size = bytes;
        self
    }

    pub fn max_open_files(mut self, count: usize) -> Self {
        self.options.max_open_files = count;
        self
    }

    pub fn block_size(mut self, bytes: usize) -> Self {
        self.options.block_size = bytes;
        self
    }

    /// Set the memtable size (in bytes) that triggers a flush
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.options.write_buffer_size = bytes;
        self
    }

    pub fn paranoid_checks(mut self, value: bool) -> Self {
        self.options.paranoid_checks = value;
        self
    }

    pub fn verify_checksums(mut self, value: bool) -> Self {
        self.options.verify_checksums = value;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.options.wal_sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

// =============================================================================
// Per-call Options
// =============================================================================

/// Per-write durability options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// fsync the WAL before the write returns, regardless of the sync strategy
    pub sync: bool,
}

impl WriteOptions {
    /// Options that force an fsync for this write
    pub fn sync() -> Self {
        Self { sync: true }
    }
}

/// How `KeyValueStore::get` reports an engine read failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadErrorPolicy {
    /// Log the failure and report the key as absent
    #[default]
    MaskAsAbsent,

    /// Return the failure to the caller
    Propagate,
}
