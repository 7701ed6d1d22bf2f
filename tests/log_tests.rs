//! Tests for Log
//!
//! These tests verify:
//! - Append/read round trips and contiguous offsets
//! - Out-of-range errors carrying the requested offset
//! - Rollover into new segments
//! - Recovery of existing segments on reopen, including torn store tails
//! - Truncation, removal and reset
//! - Full-stream export
//! - Concurrent appends and reads

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use seglog::storage::{frames, ENTRY_WIDTH, LEN_WIDTH};
use seglog::{Config, Log, LogError, Record};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("log");
    (temp_dir, path)
}

/// Two "record" frames (30 bytes each) per segment
fn small_segments() -> Config {
    Config::builder().max_store_bytes(32).build()
}

fn record() -> Record {
    Record::new(b"record".to_vec())
}

fn append_n(log: &Log, n: usize) -> Vec<u64> {
    (0..n).map(|_| log.append(record()).unwrap()).collect()
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_directory_and_segment() {
    let (_temp, path) = setup_temp_log();
    assert!(!path.exists());

    let log = Log::open(&path, Config::default()).unwrap();

    assert!(path.is_dir());
    assert_eq!(log.segment_count(), 1);
    assert!(path.join("0.store").exists());
    assert!(path.join("0.index").exists());
}

#[test]
fn test_zero_thresholds_use_defaults() {
    let (_temp, path) = setup_temp_log();
    let config = Config::builder().max_store_bytes(0).max_index_bytes(0).build();

    let log = Log::open(&path, config).unwrap();

    assert_eq!(log.config().segment.max_store_bytes, 1024);
    assert_eq!(log.config().segment.max_index_bytes, 1024);
}

#[test]
fn test_open_ignores_unrelated_files() {
    let (_temp, path) = setup_temp_log();
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("notes.txt"), b"hello").unwrap();
    fs::write(path.join("garbage.store"), b"").unwrap();
    fs::create_dir(path.join("7.store")).unwrap();

    let log = Log::open(&path, Config::default()).unwrap();

    assert_eq!(log.segment_count(), 1);
    assert_eq!(log.lowest_offset().unwrap(), 0);
}

// =============================================================================
// Append / Read Tests
// =============================================================================

#[test]
fn test_append_and_read() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, small_segments()).unwrap();

    let offset = log.append(record()).unwrap();
    assert_eq!(offset, 0);

    let read = log.read(offset).unwrap();
    assert_eq!(read.value, b"record");
    assert_eq!(read.offset, 0);
}

#[test]
fn test_offsets_contiguous_from_initial_offset() {
    let (_temp, path) = setup_temp_log();
    let config = Config::builder().initial_offset(5).max_store_bytes(100).build();
    let log = Log::open(&path, config).unwrap();

    let offsets: Vec<u64> = (0..10u64)
        .map(|i| log.append(Record::new(i.to_string())).unwrap())
        .collect();
    assert_eq!(offsets, (5..15).collect::<Vec<_>>());

    for (i, offset) in offsets.iter().enumerate() {
        assert_eq!(log.read(*offset).unwrap().value, i.to_string().into_bytes());
    }
    assert!(log.segment_count() > 1);
}

#[test]
fn test_read_out_of_range() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, small_segments()).unwrap();

    match log.read(1) {
        Err(LogError::OffsetOutOfRange { offset }) => assert_eq!(offset, 1),
        other => panic!("expected out of range, got {:?}", other),
    }

    append_n(&log, 3);
    assert!(log.read(3).unwrap_err().is_out_of_range());
    assert!(log.read(u64::MAX).unwrap_err().is_out_of_range());
}

#[test]
fn test_read_below_initial_offset_is_out_of_range() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, Config::builder().initial_offset(10).build()).unwrap();
    log.append(record()).unwrap();

    match log.read(9) {
        Err(LogError::OffsetOutOfRange { offset }) => assert_eq!(offset, 9),
        other => panic!("expected out of range, got {:?}", other),
    }
}

// =============================================================================
// Rollover Tests
// =============================================================================

#[test]
fn test_rollover_on_full_index() {
    let (_temp, path) = setup_temp_log();
    let config = Config::builder()
        .initial_offset(16)
        .max_index_bytes(3 * ENTRY_WIDTH)
        .max_store_bytes(1024)
        .build();
    let log = Log::open(&path, config).unwrap();

    assert_eq!(append_n(&log, 3), vec![16, 17, 18]);
    assert_eq!(log.segment_count(), 2);
    assert!(path.join("19.store").exists());

    assert_eq!(log.append(record()).unwrap(), 19);
    assert_eq!(log.read(18).unwrap().offset, 18);
    assert_eq!(log.read(19).unwrap().offset, 19);
}

#[test]
fn test_rollover_on_full_store() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, small_segments()).unwrap();

    append_n(&log, 6);

    // [0,2) [2,4) [4,6) [6,..)
    assert_eq!(log.segment_count(), 4);
    for offset in 0..6 {
        assert_eq!(log.read(offset).unwrap().offset, offset);
    }
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_reopen_existing_log() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, small_segments()).unwrap();
    append_n(&log, 3);
    log.close().unwrap();

    assert_eq!(log.lowest_offset().unwrap(), 0);
    assert_eq!(log.highest_offset().unwrap(), 2);

    let reopened = Log::open(&path, log.config().clone()).unwrap();
    assert_eq!(reopened.segment_count(), 2);
    assert_eq!(reopened.lowest_offset().unwrap(), 0);
    assert_eq!(reopened.highest_offset().unwrap(), 2);
    assert_eq!(reopened.append(record()).unwrap(), 3);

    for offset in 0..4 {
        assert_eq!(reopened.read(offset).unwrap().offset, offset);
    }
}

#[test]
fn test_reopen_with_initial_offset() {
    let (_temp, path) = setup_temp_log();
    let config = Config::builder().initial_offset(100).build();

    {
        let log = Log::open(&path, config.clone()).unwrap();
        append_n(&log, 3);
        log.close().unwrap();
    }

    let log = Log::open(&path, config).unwrap();
    assert_eq!(log.lowest_offset().unwrap(), 100);
    assert_eq!(log.highest_offset().unwrap(), 102);
    assert_eq!(log.append(record()).unwrap(), 103);
}

#[test]
fn test_reopen_with_smaller_limits_rolls_over() {
    let (_temp, path) = setup_temp_log();

    {
        let log = Log::open(&path, Config::default()).unwrap();
        append_n(&log, 4);
        log.close().unwrap();
    }

    let log = Log::open(&path, small_segments()).unwrap();
    assert_eq!(log.segment_count(), 1);

    assert_eq!(log.append(record()).unwrap(), 4);
    assert!(log.segment_count() >= 2);
    assert_eq!(log.read(0).unwrap().offset, 0);
    assert_eq!(log.read(4).unwrap().offset, 4);
}

#[test]
fn test_export_after_recovering_torn_store() {
    let (_temp, path) = setup_temp_log();

    {
        let log = Log::open(&path, Config::default()).unwrap();
        append_n(&log, 3);
        log.close().unwrap();
    }

    // Lose the tail of the last frame
    let store_path = path.join("0.store");
    let len = fs::metadata(&store_path).unwrap().len();
    let file = fs::OpenOptions::new().write(true).open(&store_path).unwrap();
    file.set_len(len - 5).unwrap();
    drop(file);

    let log = Log::open(&path, Config::default()).unwrap();
    assert_eq!(log.highest_offset().unwrap(), 1);
    assert_eq!(log.append(Record::new("after")).unwrap(), 2);
    assert_eq!(log.read(2).unwrap().value, b"after");

    let mut bytes = Vec::new();
    log.reader().read_to_end(&mut bytes).unwrap();

    let records: Vec<Record> = frames(bytes.as_slice())
        .map(|frame| Record::decode(&frame.unwrap()).unwrap())
        .collect();
    let offsets: Vec<u64> = records.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![0, 1, 2]);
    assert_eq!(records[2].value, b"after");
}

#[test]
fn test_highest_offset_of_empty_log() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, Config::default()).unwrap();

    assert_eq!(log.lowest_offset().unwrap(), 0);
    assert_eq!(log.highest_offset().unwrap(), 0);
}

// =============================================================================
// Truncate Tests
// =============================================================================

#[test]
fn test_truncate_removes_consumed_segment() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, small_segments()).unwrap();

    assert_eq!(log.append(record()).unwrap(), 0);
    log.truncate(0).unwrap();

    assert!(log.read(0).unwrap_err().is_out_of_range());
    assert!(!path.join("0.store").exists());

    // The log keeps accepting appends past the boundary
    assert_eq!(log.append(record()).unwrap(), 1);
    assert_eq!(log.lowest_offset().unwrap(), 1);
}

#[test]
fn test_truncate_keeps_partially_retained_segments() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, small_segments()).unwrap();
    append_n(&log, 6);

    // [0,2) [2,4) [4,6) [6,..)
    log.truncate(2).unwrap();

    assert_eq!(log.segment_count(), 3);
    assert_eq!(log.lowest_offset().unwrap(), 2);
    assert!(log.read(1).unwrap_err().is_out_of_range());
    assert_eq!(log.read(2).unwrap().offset, 2);
    assert_eq!(log.read(5).unwrap().offset, 5);
    assert!(!path.join("0.store").exists());
    assert!(!path.join("0.index").exists());
}

#[test]
fn test_truncate_below_lowest_is_noop() {
    let (_temp, path) = setup_temp_log();
    let config = Config::builder().initial_offset(10).build();
    let log = Log::open(&path, config).unwrap();
    append_n(&log, 2);

    log.truncate(5).unwrap();

    assert_eq!(log.segment_count(), 1);
    assert_eq!(log.read(10).unwrap().offset, 10);
}

// =============================================================================
// Remove / Reset Tests
// =============================================================================

#[test]
fn test_remove_deletes_directory() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, Config::default()).unwrap();
    append_n(&log, 2);

    log.remove().unwrap();

    assert!(!path.exists());
}

#[test]
fn test_reset_starts_fresh_log() {
    let (_temp, path) = setup_temp_log();
    let config = Config::builder().initial_offset(3).max_store_bytes(32).build();
    let log = Log::open(&path, config).unwrap();
    append_n(&log, 5);

    log.reset().unwrap();

    assert_eq!(log.segment_count(), 1);
    assert_eq!(log.lowest_offset().unwrap(), 3);
    assert!(log.read(4).unwrap_err().is_out_of_range());
    assert_eq!(log.append(record()).unwrap(), 3);
}

#[test]
fn test_append_after_close_fails() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, Config::default()).unwrap();
    log.close().unwrap();

    assert!(matches!(log.append(record()), Err(LogError::Closed)));
}

// =============================================================================
// Export Stream Tests
// =============================================================================

#[test]
fn test_reader_single_record() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, small_segments()).unwrap();
    log.append(record()).unwrap();

    let mut bytes = Vec::new();
    log.reader().read_to_end(&mut bytes).unwrap();

    let read = Record::decode(&bytes[LEN_WIDTH as usize..]).unwrap();
    assert_eq!(read.value, b"record");
    assert_eq!(read.offset, 0);
}

#[test]
fn test_reader_spans_all_segments() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, small_segments()).unwrap();

    let values: Vec<String> = (0..7).map(|i| format!("value-{}", i)).collect();
    for value in &values {
        log.append(Record::new(value.clone())).unwrap();
    }
    assert!(log.segment_count() > 1);

    // Reading flushes every store, so file lengths are current afterwards
    let mut bytes = Vec::new();
    log.reader().read_to_end(&mut bytes).unwrap();

    let store_bytes: u64 = fs::read_dir(&path)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "store"))
        .map(|p| fs::metadata(p).unwrap().len())
        .sum();
    assert_eq!(bytes.len() as u64, store_bytes);

    let records: Vec<Record> = frames(bytes.as_slice())
        .map(|frame| Record::decode(&frame.unwrap()).unwrap())
        .collect();

    assert_eq!(records.len(), values.len());
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.offset, i as u64);
        assert_eq!(record.value, values[i].as_bytes());
    }
}

#[test]
fn test_reader_of_empty_log() {
    let (_temp, path) = setup_temp_log();
    let log = Log::open(&path, Config::default()).unwrap();

    let mut bytes = Vec::new();
    log.reader().read_to_end(&mut bytes).unwrap();
    assert!(bytes.is_empty());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_appends_get_unique_offsets() {
    let (_temp, path) = setup_temp_log();
    let log = Arc::new(Log::open(&path, Config::default()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        let value = format!("{}-{}", t, i);
                        (log.append(Record::new(value.clone())).unwrap(), value)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut appended: Vec<(u64, String)> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    appended.sort();

    let offsets: Vec<u64> = appended.iter().map(|(o, _)| *o).collect();
    assert_eq!(offsets, (0..100).collect::<Vec<_>>());

    for (offset, value) in appended {
        assert_eq!(log.read(offset).unwrap().value, value.into_bytes());
    }
}

#[test]
fn test_concurrent_reads_during_appends() {
    let (_temp, path) = setup_temp_log();
    let log = Arc::new(Log::open(&path, small_segments()).unwrap());
    append_n(&log, 10);

    let writer = {
        let log = Arc::clone(&log);
        thread::spawn(move || append_n(&log, 50))
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for _ in 0..20 {
                    for offset in 0..10 {
                        assert_eq!(log.read(offset).unwrap().offset, offset);
                    }
                }
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(writer.join().unwrap().len(), 50);
    assert_eq!(log.highest_offset().unwrap(), 59);
}
