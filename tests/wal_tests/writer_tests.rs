//! Tests for WAL Writer
//!
//! These tests verify:
//! - LSN sequencing, including across reopen and truncation
//! - Sync strategies (EveryWrite, EveryNEntries, forced)
//! - Written entries read back through the reader

use std::path::{Path, PathBuf};

use stratumkv::config::WalSyncStrategy;
use stratumkv::wal::{Operation, WalEntry, WalReader, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn read_all(path: &Path) -> Vec<WalEntry> {
    let mut reader = WalReader::open(path).unwrap();
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().unwrap() {
        entries.push(entry);
    }
    entries
}

fn delete(key: &[u8]) -> Operation {
    Operation::Delete { key: key.to_vec() }
}

// =============================================================================
// LSN Tests
// =============================================================================

#[test]
fn test_lsn_starts_at_one_and_increments() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(writer.append(delete(b"a")).unwrap(), 1);
    assert_eq!(writer.append(delete(b"b")).unwrap(), 2);
    assert_eq!(writer.current_lsn(), 3);
}

#[test]
fn test_reopen_continues_numbering() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(delete(b"a")).unwrap();
        writer.append(delete(b"b")).unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(delete(b"c")).unwrap(), 3);

    assert_eq!(read_all(&wal_path).len(), 3);
}

#[test]
fn test_truncate_empties_file_but_keeps_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(delete(b"a")).unwrap();
    writer.append(delete(b"b")).unwrap();

    writer.truncate().unwrap();

    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.append(delete(b"c")).unwrap(), 3);

    let entries = read_all(&wal_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 3);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_every_write_leaves_nothing_unsynced() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(delete(b"a")).unwrap();
    assert_eq!(writer.unsynced_entries(), 0);
}

#[test]
fn test_every_n_entries_batches_syncs() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();

    writer.append(delete(b"a")).unwrap();
    writer.append(delete(b"b")).unwrap();
    assert_eq!(writer.unsynced_entries(), 2);

    writer.append(delete(b"c")).unwrap();
    assert_eq!(writer.unsynced_entries(), 0);
}

#[test]
fn test_forced_sync() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();

    writer.append(delete(b"a")).unwrap();
    writer.append_with(delete(b"b"), true).unwrap();
    assert_eq!(writer.unsynced_entries(), 0);
}

#[test]
fn test_unsynced_entries_still_readable() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();
    writer
        .append(Operation::Put {
            key: b"k".to_vec(),
            value: b"v".to_vec(),
        })
        .unwrap();

    let entry = WalReader::open(&wal_path).unwrap().next_entry().unwrap().unwrap();
    assert_eq!(
        entry.operation,
        Operation::Put {
            key: b"k".to_vec(),
            value: b"v".to_vec()
        }
    );
}
