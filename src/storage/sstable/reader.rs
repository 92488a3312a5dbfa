//! SSTable Reader
//!
//! Point lookups through an index held in memory, plus sequential scans.
//! A reader is shared through `&self`; file access is serialized by a mutex
//! while the index is read without locking.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, StratumError};

use super::iterator::SSTableIterator;
use super::{
    decode_record_prefix, u32_at, u64_at, Footer, Header, FOOTER_SIZE, HEADER_SIZE, RECORD_PREFIX,
    VERSION,
};

/// Index entry prefix: key length + record offset
const INDEX_PREFIX: usize = 12;

/// Open SSTable with its key index loaded
pub struct SSTableReader {
    path: PathBuf,
    file: Mutex<BufReader<File>>,
    /// key → record offset
    index: BTreeMap<Vec<u8>, u64>,
    /// End of the data block
    index_offset: u64,
}

impl SSTableReader {
    /// Open and validate an SSTable.
    ///
    /// Structural damage, and with `verify_checksums` a data CRC mismatch,
    /// are reported as [`StratumError::Corruption`].
    pub fn open(path: &Path, verify_checksums: bool) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let corrupt = |what: String| StratumError::Corruption(format!("{}: {}", path.display(), what));

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(format!("file too short ({} bytes)", file_size)));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let header = Header::decode(&header).ok_or_else(|| corrupt("bad magic".to_string()))?;
        if header.version != VERSION {
            return Err(StratumError::Storage(format!(
                "Unsupported SSTable version: {}",
                header.version
            )));
        }

        let index_end = file_size - FOOTER_SIZE;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.seek(SeekFrom::Start(index_end))?;
        file.read_exact(&mut footer)?;
        let footer = Footer::decode(&footer);

        if !(HEADER_SIZE..=index_end).contains(&footer.index_offset) {
            return Err(corrupt(format!(
                "index offset {} out of bounds",
                footer.index_offset
            )));
        }

        if verify_checksums {
            let actual = data_crc(&mut file, footer.index_offset)?;
            if actual != footer.data_crc {
                return Err(corrupt(format!(
                    "data CRC mismatch: stored {:#010x}, computed {:#010x}",
                    footer.data_crc, actual
                )));
            }
        }

        let mut raw_index = vec![0u8; (index_end - footer.index_offset) as usize];
        file.seek(SeekFrom::Start(footer.index_offset))?;
        file.read_exact(&mut raw_index)?;
        let index = parse_index(&raw_index, footer.index_offset).map_err(corrupt)?;

        if index.len() as u64 != header.entry_count {
            return Err(corrupt(format!(
                "index has {} entries, header says {}",
                index.len(),
                header.entry_count
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            index_offset: footer.index_offset,
        })
    }

    /// Look up one key.
    ///
    /// `Ok(Some(v))` for a live value, `Ok(None)` for a tombstone, and
    /// [`StratumError::KeyNotFound`] when this table has no record for `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = *self.index.get(key).ok_or(StratumError::KeyNotFound)?;
        let mut file = self.file.lock();

        let mut prefix = [0u8; RECORD_PREFIX];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut prefix)?;

        let (key_len, val_len) = decode_record_prefix(&prefix);
        let Some(val_len) = val_len else {
            return Ok(None);
        };

        file.seek_relative(key_len as i64)?;
        let mut value = vec![0u8; val_len];
        file.read_exact(&mut value)?;
        Ok(Some(value))
    }

    /// Keys (tombstones included) within `range`, ascending; iterate with
    /// `next_back` for descending order
    pub fn keys(
        &self,
        range: (Bound<&[u8]>, Bound<&[u8]>),
    ) -> impl DoubleEndedIterator<Item = &[u8]> + '_ {
        self.index.range::<[u8], _>(range).map(|(k, _)| k.as_slice())
    }

    pub fn entry_count(&self) -> u64 {
        self.index.len() as u64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(Vec::as_slice)
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(Vec::as_slice)
    }

    /// Range check against the table's key bounds
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => min <= key && key <= max,
            _ => false,
        }
    }

    /// All records in key order; holds the file lock until dropped
    pub fn iter(&self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(self.file.lock(), self.index_offset)
    }
}

/// CRC32 of the data block `[HEADER_SIZE, end)`
fn data_crc(file: &mut File, end: u64) -> Result<u32> {
    file.seek(SeekFrom::Start(HEADER_SIZE))?;
    let mut hasher = crc32fast::Hasher::new();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut remaining = end - HEADER_SIZE;
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        file.read_exact(&mut chunk[..n])?;
        hasher.update(&chunk[..n]);
        remaining -= n as u64;
    }
    Ok(hasher.finalize())
}

/// Decode `[key_len][offset][key]*`; every offset must point into the data block
fn parse_index(raw: &[u8], data_end: u64) -> std::result::Result<BTreeMap<Vec<u8>, u64>, String> {
    let mut index = BTreeMap::new();
    let mut rest = raw;
    while !rest.is_empty() {
        if rest.len() < INDEX_PREFIX {
            return Err("truncated index entry".to_string());
        }
        let key_len = u32_at(rest, 0) as usize;
        let offset = u64_at(rest, 4);
        rest = &rest[INDEX_PREFIX..];

        if rest.len() < key_len || offset < HEADER_SIZE || offset >= data_end {
            return Err("malformed index entry".to_string());
        }
        index.insert(rest[..key_len].to_vec(), offset);
        rest = &rest[key_len..];
    }
    Ok(index)
}
