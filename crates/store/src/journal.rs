// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change journal: append-only audit records of every mutation attempt,
//! with before/after snapshots for manual rollback.

use crate::event::StoreEvent;
use crate::store::{CurationStore, StoreError};
use curator_core::{
    journal_key, AttemptId, Clock, CuratorConfig, JobId, JournalEntry, JournalId,
    OperationOutcome,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("journal entry already recorded for job {job_id} attempt {attempt_id}")]
    DuplicateAttempt { job_id: JobId, attempt_id: AttemptId },
}

pub struct JournalWriter<C: Clock> {
    store: Arc<CurationStore>,
    clock: C,
    retention_ms: u64,
}

impl<C: Clock> JournalWriter<C> {
    pub fn new(store: Arc<CurationStore>, clock: C, config: &CuratorConfig) -> Self {
        Self {
            store,
            clock,
            retention_ms: config.journal_retention_ms(),
        }
    }

    /// Record the outcomes of one job attempt. One entry per (job, attempt);
    /// a second write for the same pair is refused, never overwritten.
    pub fn append(
        &self,
        job_id: &JobId,
        attempt_id: &AttemptId,
        operations: Vec<OperationOutcome>,
    ) -> Result<JournalEntry, JournalError> {
        let entry = JournalEntry {
            id: JournalId::new(),
            job_id: job_id.clone(),
            attempt_id: attempt_id.clone(),
            operations,
            recorded_at_ms: self.clock.epoch_ms(),
        };
        let key = entry.storage_key();

        let appended = self.store.transact(|tx| {
            if tx.state().journal.contains_key(&key) {
                return false;
            }
            tx.stage(StoreEvent::JournalAppended {
                entry: entry.clone(),
            });
            true
        })?;
        if !appended {
            return Err(JournalError::DuplicateAttempt {
                job_id: job_id.clone(),
                attempt_id: attempt_id.clone(),
            });
        }
        tracing::debug!(
            job_id = %job_id,
            attempt_id = %attempt_id,
            operations = entry.operations.len(),
            "journal entry recorded"
        );
        Ok(entry)
    }

    pub fn get(&self, job_id: &JobId, attempt_id: &AttemptId) -> Option<JournalEntry> {
        let key = journal_key(job_id, attempt_id);
        self.store.read(|state| state.journal.get(&key).cloned())
    }

    /// All entries for a job, oldest first.
    pub fn entries_for_job(&self, job_id: &JobId) -> Vec<JournalEntry> {
        self.store.read(|state| {
            let mut entries: Vec<JournalEntry> = state
                .journal
                .values()
                .filter(|entry| entry.job_id == *job_id)
                .cloned()
                .collect();
            entries.sort_by_key(|entry| entry.recorded_at_ms);
            entries
        })
    }

    /// Delete entries past the retention window. Returns the number pruned.
    pub fn prune_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.epoch_ms();
        let retention = self.retention_ms;
        let pruned = self.store.transact(|tx| {
            let keys: Vec<String> = tx
                .state()
                .journal
                .values()
                .filter(|entry| entry.recorded_at_ms.saturating_add(retention) < now)
                .map(JournalEntry::storage_key)
                .collect();
            let count = keys.len();
            if count > 0 {
                tx.stage(StoreEvent::JournalPruned { keys });
            }
            count
        })?;
        if pruned > 0 {
            tracing::info!(pruned, "journal entries pruned");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
