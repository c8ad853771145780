//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from a clean WAL (no corruption)
//! - Recovery from an empty WAL
//! - Recovery with partial writes (torn tail is cut off)
//! - Corruption before the tail is fatal
//! - Verify mode (stats only, file untouched)

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use walkv::config::SyncPolicy;
use walkv::wal::{encode_record, Operation, WalEntry, WalRecovery, WalWriter, HEADER_SIZE};
use walkv::StoreError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

/// Write entries using WalWriter (produces a well-formed WAL)
fn write_entries_via_writer(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, SyncPolicy::EveryWrite, None).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Set {
                key: format!("key{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
    }
}

/// Write raw records directly to a file (for crafting corruption)
fn write_raw(path: &PathBuf, chunks: &[&[u8]]) {
    let mut file = File::create(path).unwrap();
    for chunk in chunks {
        file.write_all(chunk).unwrap();
    }
    file.sync_all().unwrap();
}

fn file_len(path: &PathBuf) -> u64 {
    fs::metadata(path).unwrap().len()
}

// =============================================================================
// Recover: Clean WAL Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 0);
    assert_eq!(result.records_replayed, 0);
    assert_eq!(result.valid_len, 0);
    assert!(!result.was_truncated());
}

#[test]
fn test_recover_multiple_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.records_replayed, 10);
    assert_eq!(result.sets, 10);
    assert_eq!(result.deletes, 0);
    assert_eq!(result.valid_len, file_len(&wal_path));
    assert!(!result.was_truncated());

    // Verify entries are in append order
    for (i, (_, entry)) in entries.iter().enumerate() {
        assert_eq!(entry.key(), format!("key{}", i).as_bytes());
    }
}

#[test]
fn test_recover_preserves_operations_and_offsets() {
    let (_temp, wal_path) = setup_temp_wal();

    let offsets = {
        let mut writer = WalWriter::open(&wal_path, SyncPolicy::EveryWrite, None).unwrap();
        vec![
            writer.append(Operation::Set { key: b"k1".to_vec(), value: b"v1".to_vec() }).unwrap(),
            writer.append(Operation::Delete { key: b"k1".to_vec() }).unwrap(),
            writer.append(Operation::Set { key: b"k2".to_vec(), value: b"v2".to_vec() }).unwrap(),
        ]
    };

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(result.records_replayed, 3);
    assert_eq!(result.sets, 2);
    assert_eq!(result.deletes, 1);
    assert!(matches!(entries[0].1.operation, Operation::Set { .. }));
    assert!(matches!(entries[1].1.operation, Operation::Delete { .. }));
    assert!(matches!(entries[2].1.operation, Operation::Set { .. }));
    assert_eq!(entries.iter().map(|(o, _)| *o).collect::<Vec<_>>(), offsets);
}

#[test]
fn test_recover_reports_last_timestamp() {
    let (_temp, wal_path) = setup_temp_wal();
    let a = WalEntry::new(100, Operation::Set { key: b"a".to_vec(), value: b"1".to_vec() });
    let b = WalEntry::new(250, Operation::Delete { key: b"a".to_vec() });
    write_raw(&wal_path, &[&a.encode().unwrap()[..], &b.encode().unwrap()[..]]);

    let (_, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(result.last_timestamp, 250);
}

// =============================================================================
// Recover: Partial Write Tests (torn tail)
// =============================================================================

#[test]
fn test_recover_partial_header_at_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = encode_record(1, b"k", Some(b"v")).unwrap();
    write_raw(&wal_path, &[&good[..], &[0u8; 8][..]]); // 8 bytes < HEADER_SIZE

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.valid_len, good.len() as u64);
    assert_eq!(result.truncated_bytes, 8);
    assert!(result.was_truncated());
    // The torn bytes are gone from disk
    assert_eq!(file_len(&wal_path), good.len() as u64);
}

#[test]
fn test_recover_partial_data_at_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = encode_record(1, b"k", Some(b"v")).unwrap();
    let second = encode_record(2, b"k2", Some(b"v2")).unwrap();
    write_raw(&wal_path, &[&good[..], &second[..HEADER_SIZE + 1]]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert!(result.was_truncated());
    assert_eq!(file_len(&wal_path), good.len() as u64);
}

#[test]
fn test_recover_checksum_mismatch_at_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = encode_record(1, b"k1", Some(b"v1")).unwrap();
    let mut torn = encode_record(2, b"k2", Some(b"v2")).unwrap().to_vec();
    *torn.last_mut().unwrap() ^= 0xFF;
    write_raw(&wal_path, &[&good[..], &torn[..]]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.truncated_bytes, torn.len() as u64);
}

#[test]
fn test_recover_every_cut_inside_last_record() {
    let (_temp, wal_path) = setup_temp_wal();
    let first = encode_record(1, b"x", Some(b"1")).unwrap();
    let second = encode_record(2, b"y", Some(b"2")).unwrap();

    for cut in 1..second.len() {
        write_raw(&wal_path, &[&first[..], &second[..cut]]);

        let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

        assert_eq!(entries.len(), 1, "cut {}", cut);
        assert_eq!(entries[0].1.key(), b"x");
        assert_eq!(result.valid_len, first.len() as u64, "cut {}", cut);
        assert_eq!(file_len(&wal_path), first.len() as u64, "cut {}", cut);
    }
}

#[test]
fn test_append_after_recovery_lands_on_truncation_point() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = encode_record(1, b"k", Some(b"v")).unwrap();
    write_raw(&wal_path, &[&good[..], &[7u8; 10][..]]);

    let mut writer = WalWriter::open(&wal_path, SyncPolicy::EveryWrite, None).unwrap();
    let result = writer.replay(|_, _| {}).unwrap();
    assert_eq!(writer.cursor(), result.valid_len);

    let offset = writer
        .append(Operation::Set { key: b"k2".to_vec(), value: b"v2".to_vec() })
        .unwrap();
    assert_eq!(offset, good.len() as u64);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(!result.was_truncated());
}

// =============================================================================
// Recover: Corruption Tests
// =============================================================================

#[test]
fn test_recover_mid_log_corruption_is_fatal() {
    let (_temp, wal_path) = setup_temp_wal();
    let first = encode_record(1, b"k1", Some(b"v1")).unwrap();
    let mut bad = encode_record(2, b"k2", Some(b"v2")).unwrap().to_vec();
    bad[HEADER_SIZE] ^= 0xFF;
    let third = encode_record(3, b"k3", Some(b"v3")).unwrap();
    write_raw(&wal_path, &[&first[..], &bad[..], &third[..]]);
    let len_before = file_len(&wal_path);

    let result = WalRecovery::recover(&wal_path);

    match result {
        Err(StoreError::Corruption { offset, .. }) => assert_eq!(offset, first.len() as u64),
        other => panic!("expected corruption, got {:?}", other),
    }
    // Nothing is cut off when recovery fails
    assert_eq!(file_len(&wal_path), len_before);
}

#[test]
fn test_recover_damaged_length_keeps_later_records() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let len_before = file_len(&wal_path);

    // key_length of record 0 now claims ~16 MiB
    let mut file = OpenOptions::new().write(true).open(&wal_path).unwrap();
    file.seek(SeekFrom::Start(8)).unwrap();
    file.write_all(&0x00FF_FFFFu32.to_le_bytes()).unwrap();
    drop(file);

    let result = WalRecovery::recover(&wal_path);

    assert!(matches!(result, Err(StoreError::Corruption { offset: 0, .. })));
    assert_eq!(file_len(&wal_path), len_before);
}

#[test]
fn test_recover_corruption_at_first_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut bad = encode_record(1, b"k", Some(b"v")).unwrap().to_vec();
    bad[3] ^= 0xFF; // timestamp byte
    let good = encode_record(2, b"k2", Some(b"v2")).unwrap();
    write_raw(&wal_path, &[&bad[..], &good[..]]);

    let result = WalRecovery::recover(&wal_path);

    assert!(matches!(result, Err(StoreError::Corruption { offset: 0, .. })));
}

// =============================================================================
// Verify Tests (stats only, same logic as recover)
// =============================================================================

#[test]
fn test_verify_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 5);

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.records_replayed, 5);
    assert!(!result.was_truncated());
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = encode_record(1, b"k", Some(b"v")).unwrap();
    write_raw(&wal_path, &[&good[..], &[0u8; 5][..]]);

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.records_replayed, 1);
    assert_eq!(result.truncated_bytes, 5);
    assert_eq!(file_len(&wal_path), good.len() as u64 + 5);
}

#[test]
fn test_verify_reports_mid_log_corruption() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut bad = encode_record(1, b"k", Some(b"v")).unwrap().to_vec();
    bad[HEADER_SIZE] ^= 0xFF;
    let good = encode_record(2, b"k2", Some(b"v2")).unwrap();
    write_raw(&wal_path, &[&bad[..], &good[..]]);

    assert!(matches!(
        WalRecovery::verify(&wal_path),
        Err(StoreError::Corruption { .. })
    ));
}

#[test]
fn test_verify_missing_file_fails() {
    let (_temp, wal_path) = setup_temp_wal();

    assert!(matches!(WalRecovery::verify(&wal_path), Err(StoreError::Io(_))));
}

// =============================================================================
// Recover + Verify Consistency Test
// =============================================================================

#[test]
fn test_recover_and_verify_agree() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 20);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0u8; 3]).unwrap();

    let verify_result = WalRecovery::verify(&wal_path).unwrap();
    let (entries, recover_result) = WalRecovery::recover(&wal_path).unwrap();

    // Both should report identical stats
    assert_eq!(entries.len() as u64, recover_result.records_replayed);
    assert_eq!(recover_result, verify_result);
}
