// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use curator_core::JobId;
use std::io::Write as _;
use tempfile::tempdir;

fn test_event(job: &str) -> StoreEvent {
    StoreEvent::JobRunning {
        job_id: JobId::from_string(job),
        at_ms: 1_000,
    }
}

fn event_job_id(event: &StoreEvent) -> &str {
    match event {
        StoreEvent::JobRunning { job_id, .. } => job_id.as_str(),
        other => panic!("expected JobRunning, got {}", other.kind()),
    }
}

#[test]
fn open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let wal = Wal::open(&path).unwrap();

    assert!(path.exists());
    assert_eq!(wal.write_seq(), 0);
}

#[test]
fn append_assigns_monotonic_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path).unwrap();
    let seq1 = wal.append(&test_event("job-1")).unwrap();
    let seq2 = wal.append(&test_event("job-2")).unwrap();
    wal.flush().unwrap();

    assert_eq!(seq1, 1);
    assert_eq!(seq2, 2);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn entries_after_filters_by_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path).unwrap();
    wal.append(&test_event("job-1")).unwrap();
    wal.append(&test_event("job-2")).unwrap();
    wal.append(&test_event("job-3")).unwrap();
    wal.flush().unwrap();

    let entries = wal.entries_after(1).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);
    assert_eq!(entries[1].seq, 3);
    assert_eq!(event_job_id(&entries[1].event), "job-3");
}

#[test]
fn reopen_resumes_seq_numbering() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&test_event("job-1")).unwrap();
        wal.append(&test_event("job-2")).unwrap();
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 2);
    let seq = wal.append(&test_event("job-3")).unwrap();
    assert_eq!(seq, 3);
}

#[test]
fn truncate_before_drops_compacted_prefix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path).unwrap();
    wal.append(&test_event("job-1")).unwrap();
    wal.append(&test_event("job-2")).unwrap();
    wal.append(&test_event("job-3")).unwrap();
    wal.flush().unwrap();

    wal.truncate_before(2).unwrap();

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);
    assert_eq!(entries[1].seq, 3);

    // Appends still work through the replaced file handle
    let seq = wal.append(&test_event("job-4")).unwrap();
    wal.flush().unwrap();
    assert_eq!(seq, 4);
    assert_eq!(wal.entries_after(0).unwrap().len(), 3);
}

#[test]
fn discard_unsynced_drops_buffered_entries_and_rewinds_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path).unwrap();
    wal.append(&test_event("job-1")).unwrap();
    wal.flush().unwrap();

    // Buffered but never synced; the caller gave up on this one
    wal.append(&test_event("job-2")).unwrap();
    wal.discard_unsynced().unwrap();
    wal.flush().unwrap();

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, 1);

    // Sequence numbering rewinds along with the content
    let seq = wal.append(&test_event("job-3")).unwrap();
    wal.flush().unwrap();
    assert_eq!(seq, 2);
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(event_job_id(&entries[1].event), "job-3");
}

#[test]
fn discard_unsynced_with_nothing_buffered_is_a_noop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path).unwrap();
    wal.append(&test_event("job-1")).unwrap();
    wal.flush().unwrap();

    wal.discard_unsynced().unwrap();
    assert_eq!(wal.write_seq(), 1);
    assert_eq!(wal.entries_after(0).unwrap().len(), 1);
}

#[test]
fn open_corrupt_wal_creates_bak_and_preserves_valid_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&test_event("job-1")).unwrap();
        wal.append(&test_event("job-2")).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        f.write_all(b"not-valid-json\n").unwrap();
    }

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 2);

    let bak = path.with_extension("bak");
    assert!(bak.exists());

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].seq, 2);
}

#[test]
fn open_corrupt_wal_rotates_bak_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    // Four corrupt opens keep at most three backups
    for i in 1..=4u8 {
        {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(&[i; 8]).unwrap();
        }
        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.write_seq(), 0);
    }

    let bak1 = path.with_extension("bak");
    assert_eq!(std::fs::read(&bak1).unwrap(), vec![4u8; 8]);

    let bak2 = path.with_extension("bak.2");
    assert_eq!(std::fs::read(&bak2).unwrap(), vec![3u8; 8]);

    let bak3 = path.with_extension("bak.3");
    assert_eq!(std::fs::read(&bak3).unwrap(), vec![2u8; 8]);

    assert!(!path.with_extension("bak.4").exists());
}

#[test]
fn entries_after_stops_at_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    let mut wal = Wal::open(&path).unwrap();
    wal.append(&test_event("job-1")).unwrap();
    wal.append(&test_event("job-2")).unwrap();
    wal.flush().unwrap();

    // Corrupt after open so the scan, not open(), hits it
    {
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        f.write_all(b"post-open-corruption\n").unwrap();
    }

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].seq, 2);
}

#[test]
fn open_with_binary_wal_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    std::fs::write(&path, b"\x80\x81\x82\xff\xfe\n").unwrap();

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 0);
    assert!(path.with_extension("bak").exists());
}

#[test]
fn open_with_valid_entries_then_binary() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&test_event("job-1")).unwrap();
        wal.append(&test_event("job-2")).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        f.write_all(b"\x80\x81\x82\xff\xfe\n").unwrap();
    }

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 2);
    assert!(path.with_extension("bak").exists());

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
}
