//! Boundary scenarios for the `Buffer` façade (spec.md §8)

mod common;

use std::path::PathBuf;

use common::{count_files, init_tracing, sequential_hash_fn, write_temp_file};
use indexed_buffer::{Buffer, Keep};
use pretty_assertions::assert_eq;

fn gb_for_bytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

// `Store`'s cached size accounting only tracks bytes it moves or deletes
// itself (see `Store::move_into`/`Store::delete`); the catalog's sqlite file
// is invisible to it until the next full traversal, which these tests never
// wait out. So quota math below is sized against artifact bytes alone.

#[test]
fn full_detection() {
    let parent = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let payload = b"hello world"; // 11 bytes

    // Quota smaller than a single artifact: the first push succeeds (there
    // is nothing to evict yet) but leaves the store over quota.
    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(gb_for_bytes(1)),
        Some(sequential_hash_fn("full-detection")),
    )
    .unwrap();

    assert!(!buffer.full());

    let payload_path = write_temp_file(staging.path(), "direct", payload);
    assert!(buffer.push(1_000, 9, &payload_path));

    assert!(buffer.full());
}

#[test]
fn eviction_cycle() {
    let parent = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let payload = b"hello world"; // 11 bytes

    // One byte short of a single artifact: after the first push the store
    // is already over quota, so the second push's eviction pass fires
    // before ingest.
    let quota_bytes = payload.len() as u64 - 1;

    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(gb_for_bytes(quota_bytes)),
        Some(sequential_hash_fn("eviction")),
    )
    .unwrap();

    let t0 = 1_000u64;
    let payload_a = write_temp_file(staging.path(), "a", payload);
    assert!(buffer.push(t0, 1, &payload_a));
    assert_eq!(count_files(&PathBuf::from(buffer.get_buffer_directory())), 2);

    let t1 = t0 + 60_000;
    let payload_b = write_temp_file(staging.path(), "b", payload);
    assert!(buffer.push(t1, 1, &payload_b));

    // Still exactly one artifact file (plus the index) present: the first
    // was evicted to make room for the second.
    assert_eq!(count_files(&PathBuf::from(buffer.get_buffer_directory())), 2);

    let catalog = buffer.get_catalog().unwrap();
    let by_hour = catalog.get(&1).expect("device 1 present");
    let rows: usize = by_hour.values().map(Vec::len).sum();
    assert_eq!(rows, 1);
}

#[test]
fn preservation_blocks_overwrite() {
    let parent = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let payload = b"hello world";
    let quota_bytes = payload.len() as u64 - 1;

    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(gb_for_bytes(quota_bytes)),
        Some(sequential_hash_fn("preserve")),
    )
    .unwrap();

    let t0 = 1_000u64;
    let payload_a = write_temp_file(staging.path(), "a", payload);
    assert!(buffer.push(t0, 1, &payload_a));
    assert!(buffer.preserve_record(t0, 1));

    let t1 = t0 + 60_000;
    let payload_b = write_temp_file(staging.path(), "b", payload);
    assert!(!buffer.push(t1, 2, &payload_b));

    // The preserved row is untouched.
    let catalog = buffer.get_catalog().unwrap();
    let by_hour = catalog.get(&1).expect("device 1 still present");
    assert_eq!(by_hour.values().map(Vec::len).sum::<usize>(), 1);
    assert!(catalog.get(&2).is_none());
}

#[test]
fn orphan_self_heal() {
    init_tracing();
    let parent = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();

    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(1.0),
        Some(sequential_hash_fn("orphan")),
    )
    .unwrap();

    let t0 = 5_000u64;
    let payload = write_temp_file(staging.path(), "payload", b"artifact bytes");
    assert!(buffer.push(t0, 7, &payload));

    let path = buffer.get_filepath(t0, 7);
    assert!(!path.is_empty());
    std::fs::remove_file(&path).unwrap();

    assert_eq!(buffer.get_filepath(t0, 7), "");

    let catalog = buffer.get_catalog().unwrap();
    assert!(catalog.get(&7).is_none());
}

#[test]
fn catalog_enumeration() {
    let parent = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();

    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(1.0),
        Some(sequential_hash_fn("enum")),
    )
    .unwrap();

    let hour = 120u64; // hour 120 since epoch, in minutes: 120 * 60
    for minute in 0..60u64 {
        let tp_ms = (hour * 60 + minute) * 60_000;
        let payload = write_temp_file(staging.path(), &format!("m{minute}"), b"x");
        assert!(buffer.push(tp_ms, 0, &payload));
    }

    let catalog = buffer.get_catalog().unwrap();
    let by_hour = catalog.get(&0).expect("device 0 present");
    let items = by_hour.get(&hour).expect("hour bucket present");
    assert_eq!(items.len(), 60);

    let minutes: Vec<u32> = items.iter().map(|item| item.minute).collect();
    let mut sorted = minutes.clone();
    sorted.sort_unstable();
    assert_eq!(minutes, sorted, "minutes arrive in ascending order");
    assert_eq!(sorted, (0..60).collect::<Vec<_>>());
}

#[test]
fn bulk_retention_partial_match() {
    let parent = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();

    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(2.0),
        Some(sequential_hash_fn("bulk")),
    )
    .unwrap();

    let mut all_times = Vec::new();
    for minute in 0..1440u64 {
        let tp_ms = minute * 60_000;
        let device = (minute % 2) as u32;
        all_times.push(tp_ms);
        let payload = write_temp_file(staging.path(), &format!("m{minute}"), b"x");
        assert!(buffer.push(tp_ms, device, &payload));
    }

    assert!(buffer.bulk_set_low_priority(&all_times, 1));

    // `get_catalog` doesn't surface `keep`, so inspect the index directly —
    // it's the same on-disk file the façade itself reads and writes.
    let store_root = PathBuf::from(buffer.get_buffer_directory());
    let catalog = indexed_buffer::Catalog::new(&store_root, "indexed_data.db");
    let records = catalog.select_all().unwrap();
    assert_eq!(records.len(), 1440);

    for record in records {
        if record.device == 1 {
            assert_eq!(record.keep, Keep::DeleteIfFull);
        } else {
            assert_eq!(record.keep, Keep::AttemptKeep);
        }
    }
}

#[test]
fn push_rejects_missing_source() {
    let parent = tempfile::tempdir().unwrap();
    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(1.0),
        Some(sequential_hash_fn("missing")),
    )
    .unwrap();

    let missing = parent.path().join("does-not-exist");
    assert!(!buffer.push(1_000, 1, &missing));
}

#[test]
fn push_rejects_directory_source() {
    let parent = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(1.0),
        Some(sequential_hash_fn("dir")),
    )
    .unwrap();

    let as_dir = staging.path().join("a-directory");
    std::fs::create_dir(&as_dir).unwrap();
    assert!(!buffer.push(1_000, 1, &as_dir));
}

#[test]
fn push_then_delete_round_trip() {
    let parent = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(1.0),
        Some(sequential_hash_fn("roundtrip")),
    )
    .unwrap();

    let t0 = 42_000u64;
    let payload = write_temp_file(staging.path(), "payload", b"round trip bytes");
    assert!(buffer.push(t0, 3, &payload));

    let path = buffer.get_filepath(t0, 3);
    assert!(!path.is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), b"round trip bytes");

    assert!(buffer.delete(t0, 3));
    assert_eq!(buffer.get_filepath(t0, 3), "");
}

#[test]
fn set_low_priority_is_idempotent() {
    let parent = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(1.0),
        Some(sequential_hash_fn("idempotent")),
    )
    .unwrap();

    let t0 = 9_000u64;
    let payload = write_temp_file(staging.path(), "payload", b"x");
    assert!(buffer.push(t0, 1, &payload));

    assert!(buffer.set_low_priority(t0, 1));
    assert!(buffer.set_low_priority(t0, 1));
}

#[test]
fn bulk_with_empty_input_is_vacuous_success() {
    let parent = tempfile::tempdir().unwrap();
    let buffer = Buffer::new(
        Some(parent.path().to_path_buf()),
        Some(1.0),
        Some(sequential_hash_fn("vacuous")),
    )
    .unwrap();

    assert!(buffer.bulk_preserve_record(&[], 1));
    assert!(buffer.bulk_set_low_priority(&[], 1));
    assert!(buffer.bulk_keep_if_possible(&[], 1));
}

#[test]
fn construction_rejects_non_positive_quota() {
    let parent = tempfile::tempdir().unwrap();
    let result = std::panic::catch_unwind(|| {
        Buffer::new(Some(parent.path().to_path_buf()), Some(0.0), None)
    });
    assert!(result.is_err());
}

#[test]
fn keep_priority_ordering_matches_eviction_policy() {
    assert!(Keep::DeleteIfFull < Keep::AttemptKeep);
    assert!(Keep::AttemptKeep < Keep::PreserveRecord);
    assert_eq!(Keep::DeleteIfFull.priority(), 0);
    assert_eq!(Keep::AttemptKeep.priority(), 10);
    assert_eq!(Keep::PreserveRecord.priority(), 1000);
}
