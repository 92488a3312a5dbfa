//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their on-disk
//! record encoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StratumError};

/// Record header: LSN (8) + CRC (4) + Len (4) + header CRC (4)
pub const HEADER_SIZE: usize = 20;

/// Header bytes covered by the header CRC
const HEADER_BODY: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Several puts/deletes that must be replayed together or not at all
    Batch(Vec<Operation>),
}

/// Parsed record header
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl RecordHeader {
    /// `None` when the header's own checksum does not match, so a damaged
    /// length is never mistaken for a torn tail
    pub(crate) fn parse(bytes: &[u8; HEADER_SIZE]) -> Option<Self> {
        let stored = le_u32(&bytes[16..20]);
        if crc32fast::hash(&bytes[..HEADER_BODY]) != stored {
            return None;
        }

        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&bytes[0..8]);
        Some(Self {
            lsn: u64::from_le_bytes(lsn),
            crc: le_u32(&bytes[8..12]),
            len: le_u32(&bytes[12..16]),
        })
    }

    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..8].copy_from_slice(&self.lsn.to_le_bytes());
        out[8..12].copy_from_slice(&self.crc.to_le_bytes());
        out[12..16].copy_from_slice(&self.len.to_le_bytes());
        let header_crc = crc32fast::hash(&out[..HEADER_BODY]);
        out[16..20].copy_from_slice(&header_crc.to_le_bytes());
        out
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as `[lsn][crc][len][header crc][data]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        let len = u32::try_from(data.len()).map_err(|_| {
            StratumError::Serialization(format!("WAL entry too large: {} bytes", data.len()))
        })?;
        let header = RecordHeader {
            lsn: self.lsn,
            crc: Self::compute_crc(self.lsn, len, &data),
            len,
        };

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(&data);
        Ok(bytes)
    }

    /// Decode a full record, validating length and checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let header_bytes: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| {
                StratumError::WalCorruption(format!(
                    "record shorter than header: {} bytes",
                    bytes.len()
                ))
            })?;
        let header = RecordHeader::parse(header_bytes).ok_or_else(|| {
            StratumError::WalCorruption("record header checksum mismatch".to_string())
        })?;

        let data = bytes
            .get(HEADER_SIZE..HEADER_SIZE + header.len as usize)
            .ok_or_else(|| {
                StratumError::WalCorruption(format!(
                    "record data truncated: expected {} bytes",
                    header.len
                ))
            })?;

        Self::decode(header, data)
    }

    /// CRC over the LSN, the length and the payload
    pub fn compute_crc(lsn: u64, len: u32, data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(&len.to_le_bytes());
        hasher.update(data);
        hasher.finalize()
    }

    pub(crate) fn decode(header: RecordHeader, data: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(header.lsn, header.len, data);
        if actual != header.crc {
            return Err(StratumError::WalCorruption(format!(
                "CRC mismatch at lsn {}: stored {:#010x}, computed {:#010x}",
                header.lsn, header.crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| StratumError::WalCorruption(format!("undecodable entry: {}", e)))?;

        if entry.lsn != header.lsn {
            return Err(StratumError::WalCorruption(format!(
                "LSN mismatch: header {}, entry {}",
                header.lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}

impl Operation {
    /// Number of single-key mutations carried by this operation
    pub fn mutation_count(&self) -> usize {
        match self {
            Operation::Put { .. } | Operation::Delete { .. } => 1,
            Operation::Batch(ops) => ops.iter().map(Operation::mutation_count).sum(),
        }
    }
}
