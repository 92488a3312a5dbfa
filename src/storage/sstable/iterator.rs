//! SSTable Iterator
//!
//! Sequential scan of the data block.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use parking_lot::MutexGuard;

use crate::error::{Result, StratumError};

use super::{decode_record_prefix, HEADER_SIZE, RECORD_PREFIX};

/// Records in key order as `(key, Some(value))`, or `(key, None)` for a
/// tombstone. The first error ends the iteration.
pub struct SSTableIterator<'a> {
    file: MutexGuard<'a, BufReader<File>>,
    /// Start of the index block
    data_end: u64,
    offset: u64,
    failed: bool,
}

impl<'a> SSTableIterator<'a> {
    pub(super) fn new(mut file: MutexGuard<'a, BufReader<File>>, data_end: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            data_end,
            offset: HEADER_SIZE,
            failed: false,
        })
    }

    fn read_record(&mut self) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
        let mut prefix = [0u8; RECORD_PREFIX];
        self.file.read_exact(&mut prefix)?;
        let (key_len, val_len) = decode_record_prefix(&prefix);

        let record_len = (RECORD_PREFIX + key_len + val_len.unwrap_or(0)) as u64;
        if self.offset + record_len > self.data_end {
            return Err(StratumError::Corruption(format!(
                "SSTable record at offset {} overruns the data block",
                self.offset
            )));
        }

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;
        let value = match val_len {
            Some(len) => {
                let mut value = vec![0u8; len];
                self.file.read_exact(&mut value)?;
                Some(value)
            }
            None => None,
        };

        self.offset += record_len;
        Ok((key, value))
    }
}

impl Iterator for SSTableIterator<'_> {
    type Item = Result<(Vec<u8>, Option<Vec<u8>>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data_end {
            return None;
        }
        let record = self.read_record();
        self.failed = record.is_err();
        Some(record)
    }
}
