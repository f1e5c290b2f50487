//! Tests for WAL Reader
//!
//! These tests verify:
//! - Reading entries from WAL file
//! - Iterator functionality
//! - Partial write handling
//! - Empty file handling

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use snapkv::wal::{WalEntry, WalReader, HEADER_SIZE};
use tempfile::TempDir;

use super::{del, put};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn write_entries_to_wal(path: &PathBuf, entries: &[WalEntry]) {
    let mut file = File::create(path).unwrap();
    for entry in entries {
        let bytes = entry.serialize().unwrap();
        file.write_all(&bytes).unwrap();
    }
    file.sync_all().unwrap();
}

// =============================================================================
// Basic Reading Tests
// =============================================================================

#[test]
fn test_read_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_read_multiple_entries() {
    let (_temp, wal_path) = setup_temp_wal();

    let entries = vec![
        WalEntry::new(1, 1, vec![put("k1", "v1")]),
        WalEntry::new(2, 2, vec![put("k2", "v2"), del("k1")]),
        WalEntry::new(3, 4, vec![put("k3", "v3")]),
    ];
    write_entries_to_wal(&wal_path, &entries);

    let mut reader = WalReader::open(&wal_path).unwrap();
    for (i, original) in entries.iter().enumerate() {
        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(&entry, original, "Entry {} mismatch", i);
    }

    assert!(reader.next_entry().unwrap().is_none());
}

// =============================================================================
// Iterator Tests
// =============================================================================

#[test]
fn test_iterator_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let reader = WalReader::open(&wal_path).unwrap();
    assert_eq!(reader.entries().count(), 0);
}

#[test]
fn test_iterator_for_loop() {
    let (_temp, wal_path) = setup_temp_wal();

    let entries = vec![
        WalEntry::new(1, 1, vec![put("x", "y")]),
        WalEntry::new(2, 2, vec![put("z", "w")]),
    ];
    write_entries_to_wal(&wal_path, &entries);

    let reader = WalReader::open(&wal_path).unwrap();
    let mut count = 0;
    for result in reader.entries() {
        let entry = result.unwrap();
        assert_eq!(entry.lsn, entries[count].lsn);
        count += 1;
    }

    assert_eq!(count, 2);
}

#[test]
fn test_iterator_stops_after_corruption() {
    let (_temp, wal_path) = setup_temp_wal();

    let good = WalEntry::new(1, 1, vec![put("a", "1")]).serialize().unwrap();
    let mut bad = WalEntry::new(2, 2, vec![put("b", "2")]).serialize().unwrap();
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    let after = WalEntry::new(3, 3, vec![put("c", "3")]).serialize().unwrap();

    let mut file = File::create(&wal_path).unwrap();
    file.write_all(&good).unwrap();
    file.write_all(&bad).unwrap();
    file.write_all(&after).unwrap();
    file.sync_all().unwrap();

    let results: Vec<_> = WalReader::open(&wal_path).unwrap().entries().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

// =============================================================================
// Partial Write Tests
// =============================================================================

#[test]
fn test_partial_header() {
    let (_temp, wal_path) = setup_temp_wal();

    let bytes = WalEntry::new(1, 1, vec![put("k", "v")]).serialize().unwrap();

    let mut file = File::create(&wal_path).unwrap();
    file.write_all(&bytes).unwrap();
    file.write_all(&[0u8; 8]).unwrap();
    file.sync_all().unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.valid_offset(), bytes.len() as u64);
}

#[test]
fn test_partial_data() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut bytes = WalEntry::new(1, 1, vec![put("k", "v")]).serialize().unwrap();

    let mut file = File::create(&wal_path).unwrap();
    file.write_all(&bytes).unwrap();

    // Complete header, truncated data
    bytes.truncate(HEADER_SIZE + 4);
    file.write_all(&bytes).unwrap();
    file.sync_all().unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_none());
    // Stays at the end once reached
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_partial_data_longer_than_a_header() {
    let (_temp, wal_path) = setup_temp_wal();

    let big = WalEntry::new(1, 1, vec![put("k", &"v".repeat(200))]).serialize().unwrap();

    let mut file = File::create(&wal_path).unwrap();
    file.write_all(&big[..HEADER_SIZE + 100]).unwrap();
    file.sync_all().unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.valid_offset(), 0);
}
