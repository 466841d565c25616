// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay.

mod jobs;
mod locks;
mod records;

use crate::event::StoreEvent;
use curator_core::{IdempotencyRecord, Job, JournalEntry, ResourceLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Materialized curation state built from store events.
///
/// # Idempotency Requirement
///
/// **All event handlers MUST be idempotent.** A snapshot plus its WAL tail
/// can overlap, so applying the same event twice must produce the same
/// state as applying it once. Guard increments with status checks and use
/// assignment over mutation.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DurableState {
    /// jobs/{job_id}
    pub jobs: HashMap<String, Job>,
    /// locks/{resource_key}
    pub locks: HashMap<String, ResourceLock>,
    /// idempotency/{key}
    pub idempotency: HashMap<String, IdempotencyRecord>,
    /// changes/{job_id}_{attempt_id}
    pub journal: HashMap<String, JournalEntry>,
}

impl DurableState {
    pub fn get_job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Apply an event to derive state changes.
    pub fn apply_event(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::JobEnqueued { .. }
            | StoreEvent::JobLeased { .. }
            | StoreEvent::JobRunning { .. }
            | StoreEvent::LeaseRenewed { .. }
            | StoreEvent::JobSucceeded { .. }
            | StoreEvent::JobRequeued { .. }
            | StoreEvent::JobNeedsReview { .. }
            | StoreEvent::JobDeadlettered { .. }
            | StoreEvent::JobReclaimRequeued { .. }
            | StoreEvent::JobReclaimDeadlettered { .. }
            | StoreEvent::DeadletterRequeued { .. }
            | StoreEvent::JobPruned { .. } => jobs::apply(self, event),

            StoreEvent::LockAcquired { .. }
            | StoreEvent::LockRenewed { .. }
            | StoreEvent::LockReleased { .. } => locks::apply(self, event),

            StoreEvent::IdempotencyRecorded { .. }
            | StoreEvent::IdempotencyPruned { .. }
            | StoreEvent::JournalAppended { .. }
            | StoreEvent::JournalPruned { .. } => records::apply(self, event),
        }
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
