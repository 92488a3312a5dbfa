//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from a clean or empty WAL
//! - Torn tails are cut off
//! - Checksum failures stop replay and are reported
//! - Verify mode leaves the file untouched

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use stratumkv::config::WalSyncStrategy;
use stratumkv::wal::{Operation, WalEntry, WalRecovery, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn write_puts(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("key{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
    }
}

fn record_len(lsn: u64, i: usize) -> u64 {
    WalEntry {
        lsn,
        operation: Operation::Put {
            key: format!("key{}", i).into_bytes(),
            value: format!("value{}", i).into_bytes(),
        },
        timestamp: 0,
    }
    .serialize()
    .unwrap()
    .len() as u64
}

// =============================================================================
// Clean WAL Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
    assert!(!result.has_corruption());
}

#[test]
fn test_recover_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);
}

// =============================================================================
// Damaged WAL Tests
// =============================================================================

#[test]
fn test_torn_tail_truncated() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 3);
    let clean_len = std::fs::metadata(&wal_path).unwrap().len();

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[1, 2, 3, 4, 5]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert!(result.was_truncated);
    assert!(!result.has_corruption());
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), clean_len);
}

#[test]
fn test_checksum_failure_stops_replay() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 3);

    // Flip the last payload byte of the second record
    let first = record_len(1, 0);
    let second = record_len(2, 1);
    let mut bytes = std::fs::read(&wal_path).unwrap();
    bytes[(first + second - 1) as usize] ^= 0xFF;
    std::fs::write(&wal_path, &bytes).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.has_corruption());
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), first);
}

#[test]
fn test_verify_does_not_modify() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 2);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[9; 3]).unwrap();
    drop(file);
    let len_before = std::fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert!(result.was_truncated);
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), len_before);
}

#[test]
fn test_writer_appends_cleanly_after_recovery() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 2);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xEE; 11]).unwrap();
    drop(file);

    WalRecovery::recover(&wal_path).unwrap();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(Operation::Delete { key: b"x".to_vec() }).unwrap(), 3);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(!result.was_truncated);
}
