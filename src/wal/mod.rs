//! Write-Ahead Log
//!
//! Every mutation is appended here before it reaches the memtable, so an
//! engine can rebuild unflushed state after a crash.
//!
//! ## Record Layout
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────────┐
//! │ lsn: u64 │ crc: u32 │ len: u32 │ payload (len)    │  record 1
//! ├──────────┼──────────┼──────────┼──────────────────┤
//! │ lsn: u64 │ crc: u32 │ len: u32 │ payload (len)    │  record 2 ...
//! └──────────┴──────────┴──────────┴──────────────────┘
//! ```
//!
//! The payload is a bincode-encoded [`WalEntry`]; the CRC covers lsn, len
//! and payload. A batch is logged as one record so it replays all-or-nothing.
//! A short record at the end of the file is a torn write and is discarded on
//! recovery; a complete record with a bad CRC is corruption.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE};
pub use reader::WalReader;
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
