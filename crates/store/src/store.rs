// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable store: WAL + snapshot + materialized state under one lock.
//!
//! [`CurationStore::transact`] is the atomic conditional write primitive.
//! The closure reads pre-transaction state and stages events; staged events
//! are flushed to the WAL and applied to state before the lock is released,
//! so no other caller can observe (or race) a half-committed transition.

use crate::state::DurableState;
use crate::wal::{Wal, WalError};
use crate::StoreEvent;
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const WAL_FILE: &str = "curator.wal";
const SNAPSHOT_FILE: &str = "curator.snapshot.json";
const LOCK_FILE: &str = "curator.lock";

/// Snapshot compaction threshold: events committed since the last snapshot.
const SNAPSHOT_EVERY_EVENTS: u64 = 512;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("data dir {0} is held by another process")]
    Locked(PathBuf),
}

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    seq: u64,
    state: DurableState,
}

/// One in-flight transaction. Reads see the state as of transaction start;
/// staged events take effect only when the closure returns and the WAL
/// append succeeds.
pub struct Tx<'a> {
    state: &'a DurableState,
    staged: Vec<StoreEvent>,
}

impl Tx<'_> {
    pub fn state(&self) -> &DurableState {
        self.state
    }

    pub fn stage(&mut self, event: StoreEvent) {
        self.staged.push(event);
    }
}

#[derive(Debug)]
struct Inner {
    state: DurableState,
    wal: Wal,
    snapshot_path: PathBuf,
    events_since_snapshot: u64,
    // Released when the store is dropped and the handle closes
    _dir_lock: std::fs::File,
}

/// Durable curation store.
#[derive(Debug)]
pub struct CurationStore {
    inner: Mutex<Inner>,
}

impl CurationStore {
    /// Open the store in `data_dir`, replaying the WAL tail on top of the
    /// latest snapshot. Exactly one process may hold a data dir; a second
    /// open fails with [`StoreError::Locked`] instead of corrupting the WAL.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let dir_lock = acquire_dir_lock(data_dir)?;
        let snapshot_path = data_dir.join(SNAPSHOT_FILE);
        let (mut state, snapshot_seq) = load_snapshot(&snapshot_path);

        let wal = Wal::open(&data_dir.join(WAL_FILE))?;
        let entries = wal.entries_after(snapshot_seq)?;
        let replayed = entries.len();
        for entry in entries {
            state.apply_event(&entry.event);
        }
        tracing::info!(
            jobs = state.jobs.len(),
            locks = state.locks.len(),
            snapshot_seq,
            replayed,
            "store opened"
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                state,
                wal,
                snapshot_path,
                events_since_snapshot: 0,
                _dir_lock: dir_lock,
            }),
        })
    }

    /// Read from materialized state under the store lock.
    pub fn read<R>(&self, f: impl FnOnce(&DurableState) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.state)
    }

    /// Run a conditional transaction: the closure inspects state and stages
    /// zero or more events; they commit atomically. Domain-level refusals
    /// (precondition failed, nothing staged) travel in `R`.
    pub fn transact<R>(&self, f: impl FnOnce(&mut Tx<'_>) -> R) -> Result<R, StoreError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let mut tx = Tx {
            state: &inner.state,
            staged: Vec::new(),
        };
        let out = f(&mut tx);
        let staged = tx.staged;
        if staged.is_empty() {
            return Ok(out);
        }

        let appended = (|| {
            for event in &staged {
                inner.wal.append(event)?;
            }
            inner.wal.flush()
        })();
        if let Err(err) = appended {
            // Purge half-written entries so a later flush cannot make them
            // durable without having been applied
            if let Err(discard_err) = inner.wal.discard_unsynced() {
                tracing::error!(%discard_err, "wal rollback failed after append error");
            }
            return Err(err.into());
        }
        for event in &staged {
            tracing::debug!(event = event.kind(), "committed");
            inner.state.apply_event(event);
        }

        inner.events_since_snapshot += staged.len() as u64;
        if inner.events_since_snapshot >= SNAPSHOT_EVERY_EVENTS {
            inner.write_snapshot()?;
        }
        Ok(out)
    }

    /// Force a snapshot and WAL compaction now.
    pub fn compact(&self) -> Result<(), StoreError> {
        self.inner.lock().write_snapshot()
    }
}

impl Inner {
    fn write_snapshot(&mut self) -> Result<(), StoreError> {
        let seq = self.wal.write_seq();
        let snapshot = SnapshotFile {
            seq,
            state: self.state.clone(),
        };

        let tmp = self.snapshot_path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&snapshot)?)?;
        std::fs::rename(&tmp, &self.snapshot_path)?;

        self.wal.truncate_before(seq + 1)?;
        self.events_since_snapshot = 0;
        tracing::debug!(seq, "snapshot written, wal compacted");
        Ok(())
    }
}

/// Take the advisory lock that makes the data dir single-owner. The PID is
/// written into the lockfile purely for operator forensics.
fn acquire_dir_lock(data_dir: &Path) -> Result<std::fs::File, StoreError> {
    let lock_path = data_dir.join(LOCK_FILE);
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| StoreError::Locked(data_dir.to_path_buf()))?;
    lock_file.set_len(0)?;
    writeln!(&lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

/// Load the snapshot if present. A missing or unreadable snapshot falls back
/// to empty state and a full WAL replay.
fn load_snapshot(path: &Path) -> (DurableState, u64) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return (DurableState::default(), 0),
    };
    match serde_json::from_slice::<SnapshotFile>(&bytes) {
        Ok(snapshot) => (snapshot.state, snapshot.seq),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "corrupt snapshot ignored, replaying full wal");
            (DurableState::default(), 0)
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
