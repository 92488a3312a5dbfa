//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, StratumError};
use super::entry::RecordHeader;
use super::{WalEntry, HEADER_SIZE};

/// Outcome of reading one record
#[derive(Debug)]
pub(crate) enum Record {
    /// A complete, checksum-valid entry
    Entry(WalEntry),
    /// Clean end of file
    End,
    /// The file ends in the middle of a record (torn write)
    Torn,
    /// A complete record whose checksum or contents do not verify
    Corrupt(StratumError),
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last record that was read successfully
    position: u64,
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file. A torn tail or a corrupted
    /// record is reported as [`StratumError::WalCorruption`].
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_record()? {
            Record::Entry(entry) => Ok(Some(entry)),
            Record::End => Ok(None),
            Record::Torn => Err(StratumError::WalCorruption(format!(
                "incomplete record at offset {}",
                self.position
            ))),
            Record::Corrupt(e) => Err(e),
        }
    }

    /// Offset of the end of the last valid record
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn read_record(&mut self) -> Result<Record> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        let filled = read_full(&mut self.reader, &mut header_bytes)?;
        if filled == 0 {
            return Ok(Record::End);
        }
        if filled < HEADER_SIZE {
            return Ok(Record::Torn);
        }

        let Some(header) = RecordHeader::parse(&header_bytes) else {
            return Ok(Record::Corrupt(StratumError::WalCorruption(format!(
                "record header checksum mismatch at offset {}",
                self.position
            ))));
        };

        // A verified header whose payload runs past EOF is an interrupted append
        let record_end = self.position + (HEADER_SIZE as u64) + u64::from(header.len);
        if record_end > self.file_len {
            return Ok(Record::Torn);
        }

        let mut data = vec![0u8; header.len as usize];
        if read_full(&mut self.reader, &mut data)? < data.len() {
            return Ok(Record::Torn);
        }

        match WalEntry::decode(header, &data) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + data.len()) as u64;
                Ok(Record::Entry(entry))
            }
            Err(e) => Ok(Record::Corrupt(e)),
        }
    }
}

/// Fill `buf` as far as the file allows; returns the number of bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
