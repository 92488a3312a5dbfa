//! Tests for WAL record encoding
//!
//! These tests verify:
//! - Header layout and batch records
//! - CRC32 corruption detection
//! - Truncated and malformed records

use stratumkv::wal::{Operation, WalEntry, HEADER_SIZE};
use stratumkv::StratumError;

// =============================================================================
// Helper Functions
// =============================================================================

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn assert_wal_corruption(result: Result<WalEntry, StratumError>) {
    match result {
        Err(StratumError::WalCorruption(_)) => {}
        other => panic!("expected WalCorruption, got {:?}", other),
    }
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_header_layout() {
    let entry = WalEntry::new(7, put("k", "v"));
    let bytes = entry.serialize().unwrap();

    let lsn = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap());

    assert_eq!(lsn, 7);
    assert_eq!(len as usize, bytes.len() - HEADER_SIZE);
    assert_eq!(crc, WalEntry::compute_crc(lsn, len, &bytes[HEADER_SIZE..]));
}

#[test]
fn test_batch_record_decodes_whole() {
    let batch = Operation::Batch(vec![
        put("a", "1"),
        Operation::Delete { key: b"b".to_vec() },
        put("c", "3"),
    ]);
    let entry = WalEntry::new(3, batch);

    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded, entry);
    assert_eq!(decoded.operation.mutation_count(), 3);
}

#[test]
fn test_binary_key_and_empty_value() {
    let entry = WalEntry::new(
        1,
        Operation::Put {
            key: vec![0x00, 0xFF, 0x80],
            value: vec![],
        },
    );

    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();
    assert_eq!(decoded, entry);
}

// =============================================================================
// Corruption Detection Tests
// =============================================================================

#[test]
fn test_flipped_payload_bit_detected() {
    let mut bytes = WalEntry::new(1, put("key", "value")).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    assert_wal_corruption(WalEntry::deserialize(&bytes));
}

#[test]
fn test_rewritten_lsn_detected() {
    let mut bytes = WalEntry::new(1, put("key", "value")).serialize().unwrap();
    bytes[0] = 2;

    assert_wal_corruption(WalEntry::deserialize(&bytes));
}

#[test]
fn test_truncated_record_detected() {
    let bytes = WalEntry::new(1, put("key", "value")).serialize().unwrap();

    assert_wal_corruption(WalEntry::deserialize(&bytes[..HEADER_SIZE - 1]));
    assert_wal_corruption(WalEntry::deserialize(&bytes[..bytes.len() - 1]));
}

#[test]
fn test_corruption_errors_classified() {
    let err = WalEntry::deserialize(&[0u8; 4]).unwrap_err();
    assert!(err.is_corruption());
}
