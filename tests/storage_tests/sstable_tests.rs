//! SSTable Tests
//!
//! Tests verify:
//! - Build → open → lookup
//! - Tombstones and key ordering rules
//! - Structural and checksum corruption detection

use std::ops::Bound;
use std::path::{Path, PathBuf};

use stratumkv::storage::{SSTableBuilder, SSTableReader};
use stratumkv::StratumError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sstable_000001.sst");
    (temp_dir, path)
}

/// Table with keys k00..k{n} and values v00..v{n}
fn build_table(path: &Path, n: usize) {
    let mut builder = SSTableBuilder::new(path).unwrap();
    for i in 0..n {
        builder
            .add(format!("k{:02}", i).as_bytes(), format!("v{:02}", i).as_bytes())
            .unwrap();
    }
    builder.finish().unwrap();
}

fn assert_corruption(result: stratumkv::Result<SSTableReader>) {
    match result {
        Err(StratumError::Corruption(_)) => {}
        Err(other) => panic!("expected Corruption, got {:?}", other),
        Ok(_) => panic!("expected Corruption, table opened"),
    }
}

// =============================================================================
// Build & Read Tests
// =============================================================================

#[test]
fn test_build_and_lookup() {
    let (_temp, path) = setup();
    build_table(&path, 20);

    let reader = SSTableReader::open(&path, true).unwrap();

    assert_eq!(reader.entry_count(), 20);
    assert_eq!(reader.get(b"k07").unwrap(), Some(b"v07".to_vec()));
    assert_eq!(reader.min_key(), Some(&b"k00"[..]));
    assert_eq!(reader.max_key(), Some(&b"k19"[..]));
}

#[test]
fn test_key_range_over_index() {
    let (_temp, path) = setup();
    build_table(&path, 10);
    let reader = SSTableReader::open(&path, true).unwrap();

    let first = reader.keys((Bound::Excluded(&b"k03"[..]), Bound::Unbounded)).next();
    assert_eq!(first, Some(&b"k04"[..]));

    let last = reader.keys((Bound::Unbounded, Bound::Excluded(&b"k03"[..]))).next_back();
    assert_eq!(last, Some(&b"k02"[..]));

    assert_eq!(reader.keys((Bound::Included(&b"k10"[..]), Bound::Unbounded)).count(), 0);
}

#[test]
fn test_missing_key_is_key_not_found() {
    let (_temp, path) = setup();
    build_table(&path, 3);

    let reader = SSTableReader::open(&path, true).unwrap();

    assert!(matches!(reader.get(b"k99"), Err(StratumError::KeyNotFound)));
    assert!(!reader.might_contain(b"k99"));
    assert!(reader.might_contain(b"k01"));
}

#[test]
fn test_tombstone_reads_as_none() {
    let (_temp, path) = setup();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"a", b"1").unwrap();
    builder.add_tombstone(b"b").unwrap();
    let meta = builder.finish().unwrap();

    let reader = SSTableReader::open(&path, true).unwrap();

    assert_eq!(meta.entry_count(), 2);
    assert_eq!(reader.get(b"b").unwrap(), None);

    let entries: Vec<_> = reader.iter().unwrap().map(|e| e.unwrap()).collect();
    assert_eq!(
        entries,
        vec![(b"a".to_vec(), Some(b"1".to_vec())), (b"b".to_vec(), None)]
    );
}

#[test]
fn test_empty_table() {
    let (_temp, path) = setup();
    let meta = SSTableBuilder::new(&path).unwrap().finish().unwrap();

    let reader = SSTableReader::open(&path, true).unwrap();

    assert_eq!(meta.entry_count(), 0);
    assert!(!meta.might_contain(b"x"));
    assert_eq!(reader.iter().unwrap().count(), 0);
}

#[test]
fn test_keys_must_increase() {
    let (_temp, path) = setup();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"b", b"1").unwrap();

    assert!(matches!(
        builder.add(b"a", b"2"),
        Err(StratumError::InvalidArgument(_))
    ));
    assert!(builder.add(b"b", b"3").is_err());
}

#[test]
fn test_reopen_survives_many_reads() {
    let (_temp, path) = setup();
    build_table(&path, 50);
    let reader = SSTableReader::open(&path, true).unwrap();

    for i in (0..50).rev() {
        let expected = format!("v{:02}", i).into_bytes();
        assert_eq!(reader.get(format!("k{:02}", i).as_bytes()).unwrap(), Some(expected));
    }
    assert_eq!(reader.iter().unwrap().count(), 50);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_flipped_data_byte_fails_checksum() {
    let (_temp, path) = setup();
    build_table(&path, 10);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[30] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    assert_corruption(SSTableReader::open(&path, true));
}

#[test]
fn test_checksum_skipped_when_not_verifying() {
    let (_temp, path) = setup();
    build_table(&path, 10);

    // Flip a byte inside a value, leaving lengths intact
    let mut bytes = std::fs::read(&path).unwrap();
    let value_pos = 14 + 8 + 3 + 1;
    bytes[value_pos] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let reader = SSTableReader::open(&path, false).unwrap();
    assert_ne!(reader.get(b"k00").unwrap(), Some(b"v00".to_vec()));
}

#[test]
fn test_bad_magic() {
    let (_temp, path) = setup();
    build_table(&path, 2);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0..4].copy_from_slice(b"NOPE");
    std::fs::write(&path, &bytes).unwrap();

    assert_corruption(SSTableReader::open(&path, false));
}

#[test]
fn test_truncated_file() {
    let (_temp, path) = setup();
    build_table(&path, 5);

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..20]).unwrap();

    assert_corruption(SSTableReader::open(&path, false));
}

#[test]
fn test_garbage_index_offset() {
    let (_temp, path) = setup();
    build_table(&path, 5);

    let mut bytes = std::fs::read(&path).unwrap();
    let footer = bytes.len() - 16;
    bytes[footer..footer + 8].copy_from_slice(&u64::MAX.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    assert_corruption(SSTableReader::open(&path, false));
}

#[test]
fn test_unknown_version_is_not_corruption() {
    let (_temp, path) = setup();
    build_table(&path, 1);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[4..6].copy_from_slice(&99u16.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let err = SSTableReader::open(&path, false).err().unwrap();
    assert!(matches!(err, StratumError::Storage(_)));
    assert!(!err.is_corruption());
}
