//! SSTable Builder
//!
//! Streams sorted entries into a new table file. The data block is hashed as
//! it is written; the index is kept in memory and appended by `finish`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StratumError};

use super::{encode_record, Footer, Header, SSTable, HEADER_SIZE, TOMBSTONE};

/// Writes one SSTable; keys must arrive in strictly increasing order
pub struct SSTableBuilder {
    path: PathBuf,
    out: BufWriter<File>,
    /// Offset the next record will be written at
    offset: u64,
    crc: crc32fast::Hasher,
    /// (key, record offset) in key order
    index: Vec<(Vec<u8>, u64)>,
    /// Scratch space for encoding one record
    record: Vec<u8>,
}

impl SSTableBuilder {
    /// Create (or truncate) the file at `path` and write a provisional header
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut out = BufWriter::new(file);
        out.write_all(&Header::encode(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            out,
            offset: HEADER_SIZE,
            crc: crc32fast::Hasher::new(),
            index: Vec::new(),
            record: Vec::new(),
        })
    }

    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if value.len() >= TOMBSTONE as usize {
            return Err(StratumError::InvalidArgument(format!(
                "value too large for SSTable: {} bytes",
                value.len()
            )));
        }
        self.append(key, Some(value))
    }

    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.append(key, None)
    }

    fn append(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(StratumError::InvalidArgument(
                    "SSTable keys must be added in strictly increasing order".to_string(),
                ));
            }
        }

        self.record.clear();
        encode_record(&mut self.record, key, value);
        self.out.write_all(&self.record)?;
        self.crc.update(&self.record);

        self.index.push((key.to_vec(), self.offset));
        self.offset += self.record.len() as u64;
        Ok(())
    }

    /// Write the index and footer, patch the entry count, fsync
    pub fn finish(self) -> Result<SSTable> {
        let Self {
            path,
            mut out,
            offset: index_offset,
            crc,
            index,
            ..
        } = self;

        for (key, offset) in &index {
            out.write_all(&(key.len() as u32).to_le_bytes())?;
            out.write_all(&offset.to_le_bytes())?;
            out.write_all(key)?;
        }
        let footer = Footer {
            index_offset,
            data_crc: crc.finalize(),
        };
        out.write_all(&footer.encode())?;

        let mut file = out
            .into_inner()
            .map_err(|e| StratumError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        let entry_count = index.len() as u64;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&Header::encode(entry_count))?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();

        let min_key = index.first().map(|(k, _)| k.clone()).unwrap_or_default();
        let max_key = index.last().map(|(k, _)| k.clone()).unwrap_or_default();

        Ok(SSTable {
            path,
            entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}
