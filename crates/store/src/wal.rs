// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log: JSON-lines redo log of [`StoreEvent`]s.
//!
//! Every committed event is appended here before it is applied to
//! materialized state. On open, a corrupt tail (partial write from a crash)
//! is detected, the damaged file is rotated to `.bak`, and the log is
//! rewritten with only the valid prefix.

use crate::event::StoreEvent;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of rotated `.bak` files kept when corruption is detected repeatedly.
const MAX_BACKUPS: u32 = 3;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("wal io: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One durable log record: a monotonically increasing sequence number and
/// the event it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: StoreEvent,
}

/// Append-only event log backed by a single JSON-lines file.
#[derive(Debug)]
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
    /// Sequence number as of the last successful sync.
    synced_seq: u64,
    /// File length as of the last successful sync, the rollback point for
    /// [`discard_unsynced`](Self::discard_unsynced).
    synced_len: u64,
}

impl Wal {
    /// Open (or create) the log at `path`.
    ///
    /// Scans existing content; if a corrupt tail is found the whole file is
    /// rotated to `.bak` (keeping up to [`MAX_BACKUPS`] older copies) and
    /// rewritten with only the valid entries.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (entries, corrupt) = if path.exists() {
            read_entries(path, 0)?
        } else {
            (Vec::new(), false)
        };

        if corrupt {
            tracing::warn!(path = %path.display(), valid = entries.len(), "corrupt wal tail, rotating to .bak");
            rotate_backups(path)?;
            std::fs::copy(path, path.with_extension("bak"))?;
            let mut rewrite = BufWriter::new(File::create(path)?);
            for entry in &entries {
                serde_json::to_writer(&mut rewrite, entry)?;
                rewrite.write_all(b"\n")?;
            }
            rewrite.flush()?;
            rewrite.get_ref().sync_data()?;
        }

        let write_seq = entries.last().map(|e| e.seq).unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let synced_len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            write_seq,
            synced_seq: write_seq,
            synced_len,
        })
    }

    /// Append an event, returning its sequence number. Buffered until
    /// [`flush`](Self::flush).
    pub fn append(&mut self, event: &StoreEvent) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let entry = WalEntry {
            seq,
            event: event.clone(),
        };
        serde_json::to_writer(&mut self.writer, &entry)?;
        self.writer.write_all(b"\n")?;
        self.write_seq = seq;
        Ok(seq)
    }

    /// Flush buffered entries and sync to disk.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.synced_seq = self.write_seq;
        self.synced_len = self.writer.get_ref().metadata()?.len();
        Ok(())
    }

    /// Roll back appends that never reached a successful [`flush`](Self::flush).
    ///
    /// After a failed append or flush the buffer can hold entries the caller
    /// gave up on; letting a later flush carry them to disk would make them
    /// durable without ever being applied. Drops the buffered bytes without
    /// flushing them and truncates the file back to the last synced length.
    pub fn discard_unsynced(&mut self) -> Result<(), WalError> {
        let fresh = OpenOptions::new().append(true).open(&self.path)?;
        // into_parts surrenders the buffer unflushed; a plain drop would
        // flush it
        let (file, _buffered) =
            std::mem::replace(&mut self.writer, BufWriter::new(fresh)).into_parts();
        file.set_len(self.synced_len)?;
        file.sync_data()?;
        self.write_seq = self.synced_seq;
        Ok(())
    }

    /// All entries with `seq > after`, stopping at the first corrupt line.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let (entries, _) = read_entries(&self.path, after)?;
        Ok(entries)
    }

    /// Drop entries with `seq < cutoff` (snapshot compaction).
    pub fn truncate_before(&mut self, cutoff: u64) -> Result<(), WalError> {
        self.writer.flush()?;
        let (entries, _) = read_entries(&self.path, 0)?;

        let tmp = self.path.with_extension("wal.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for entry in entries.iter().filter(|e| e.seq >= cutoff) {
                serde_json::to_writer(&mut out, entry)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
            out.get_ref().sync_data()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        // The rename replaced the inode the append handle pointed at
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.synced_len = file.metadata()?.len();
        self.synced_seq = self.write_seq;
        self.writer = BufWriter::new(file);
        Ok(())
    }

    /// Highest sequence number handed out so far.
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }
}

/// Read entries with `seq > after` from the file. The second element is true
/// when a corrupt (unparseable or non-UTF-8) line cut the scan short.
fn read_entries(path: &Path, after: u64) -> Result<(Vec<WalEntry>, bool), WalError> {
    let bytes = std::fs::read(path)?;
    let mut entries = Vec::new();
    let mut corrupt = false;

    for line in bytes.split(|b| *b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let parsed = std::str::from_utf8(line)
            .ok()
            .and_then(|text| serde_json::from_str::<WalEntry>(text).ok());
        match parsed {
            Some(entry) => {
                if entry.seq > after {
                    entries.push(entry);
                }
            }
            None => {
                corrupt = true;
                break;
            }
        }
    }
    Ok((entries, corrupt))
}

/// Shift `.bak` → `.bak.2` → `.bak.3`, evicting the oldest.
fn rotate_backups(path: &Path) -> Result<(), WalError> {
    let backup = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };
    let oldest = backup(MAX_BACKUPS);
    if oldest.exists() {
        std::fs::remove_file(&oldest)?;
    }
    for n in (1..MAX_BACKUPS).rev() {
        let from = backup(n);
        if from.exists() {
            std::fs::rename(&from, backup(n + 1))?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
