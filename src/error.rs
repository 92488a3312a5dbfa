//! Error types for StratumKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StratumError
pub type Result<T> = std::result::Result<T, StratumError>;

/// Unified error type for StratumKV operations
#[derive(Debug, Error)]
pub enum StratumError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Corruption Errors (eligible for repair)
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("Corruption: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    /// Key is not present in a single SSTable (the caller moves on to older tables)
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration / Usage Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle / Policy Errors
    // -------------------------------------------------------------------------
    /// The store could not be opened, even after a repair attempt
    #[error("Can't initialize database at {}: {source}", path.display())]
    Initialization {
        path: PathBuf,
        #[source]
        source: Box<StratumError>,
    },

    /// An operation kept failing until its retry policy gave up
    #[error("Operation failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<StratumError>,
    },
}

impl StratumError {
    /// Whether this error was caused by damaged on-disk data.
    ///
    /// Open failures of this kind get one repair-then-reopen attempt.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_) | Self::WalCorruption(_))
    }
}

impl From<bincode::Error> for StratumError {
    fn from(e: bincode::Error) -> Self {
        StratumError::Serialization(e.to_string())
    }
}
