//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "STKV" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                │
//! │   ... repeated for each entry ...                       │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [KeyLen: u32][Offset: u64][Key]                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. The data CRC covers the whole data block.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

const MAGIC: &[u8; 4] = b"STKV";
const VERSION: u16 = 1;

pub(crate) const HEADER_SIZE: u64 = 14;
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Per-record prefix: key length + value length
const RECORD_PREFIX: usize = 8;

/// Value length marking a tombstone
const TOMBSTONE: u32 = u32::MAX;

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

/// Fixed file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    version: u16,
    entry_count: u64,
}

impl Header {
    fn encode(entry_count: u64) -> [u8; HEADER_SIZE as usize] {
        let mut out = [0u8; HEADER_SIZE as usize];
        out[0..4].copy_from_slice(MAGIC);
        out[4..6].copy_from_slice(&VERSION.to_le_bytes());
        out[6..14].copy_from_slice(&entry_count.to_le_bytes());
        out
    }

    /// `None` when the magic does not match
    fn decode(bytes: &[u8; HEADER_SIZE as usize]) -> Option<Self> {
        if &bytes[0..4] != MAGIC {
            return None;
        }
        Some(Self {
            version: u16::from_le_bytes([bytes[4], bytes[5]]),
            entry_count: u64_at(bytes, 6),
        })
    }
}

/// Fixed file footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Footer {
    index_offset: u64,
    data_crc: u32,
}

impl Footer {
    fn encode(&self) -> [u8; FOOTER_SIZE as usize] {
        let mut out = [0u8; FOOTER_SIZE as usize];
        out[0..8].copy_from_slice(&self.index_offset.to_le_bytes());
        out[8..12].copy_from_slice(&self.data_crc.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8; FOOTER_SIZE as usize]) -> Self {
        Self {
            index_offset: u64_at(bytes, 0),
            data_crc: u32_at(bytes, 8),
        }
    }
}

/// Append one data record; `None` writes a tombstone
fn encode_record(out: &mut Vec<u8>, key: &[u8], value: Option<&[u8]>) {
    let val_len = value.map_or(TOMBSTONE, |v| v.len() as u32);
    out.extend_from_slice(&(key.len() as u32).to_le_bytes());
    out.extend_from_slice(&val_len.to_le_bytes());
    out.extend_from_slice(key);
    if let Some(v) = value {
        out.extend_from_slice(v);
    }
}

/// `(key_len, value_len)` from a record prefix; tombstones have no value
fn decode_record_prefix(prefix: &[u8; RECORD_PREFIX]) -> (usize, Option<usize>) {
    let key_len = u32_at(prefix, 0) as usize;
    let val_len = u32_at(prefix, 4);
    (key_len, (val_len != TOMBSTONE).then_some(val_len as usize))
}

/// Metadata of a finished SSTable, returned by the builder
#[derive(Debug, Clone)]
pub struct SSTable {
    pub path: PathBuf,
    /// Tombstones included
    pub entry_count: u64,
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
    pub file_size: u64,
}

impl SSTable {
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Range check against the table's key bounds
    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.entry_count > 0 && self.min_key.as_slice() <= key && key <= self.max_key.as_slice()
    }
}
