// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store events.
//!
//! Events are facts about what happened; [`DurableState`](crate::state::DurableState)
//! is derived from them on WAL replay. Every handler must be idempotent:
//! an event may be applied again when a snapshot and WAL tail overlap.

use curator_core::{IdempotencyRecord, Job, JobId, JournalEntry, ResourceLock, WorkerId};
use serde::{Deserialize, Serialize};

/// One durable mutation of the curation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreEvent {
    // Jobs
    JobEnqueued {
        job: Job,
    },
    JobLeased {
        job_id: JobId,
        worker_id: WorkerId,
        lease_expires_at_ms: u64,
        at_ms: u64,
    },
    JobRunning {
        job_id: JobId,
        at_ms: u64,
    },
    LeaseRenewed {
        job_id: JobId,
        worker_id: WorkerId,
        lease_expires_at_ms: u64,
        at_ms: u64,
    },
    JobSucceeded {
        job_id: JobId,
        dry_run: bool,
        summary: Option<String>,
        at_ms: u64,
    },
    /// Attempt failed with retries remaining: back to the queue after a
    /// backoff delay.
    JobRequeued {
        job_id: JobId,
        error: String,
        run_after_ms: u64,
        at_ms: u64,
    },
    /// Plan failed validation: parked for a human, attempts preserved.
    JobNeedsReview {
        job_id: JobId,
        errors: Vec<String>,
        at_ms: u64,
    },
    /// Attempt failed with no retries remaining.
    JobDeadlettered {
        job_id: JobId,
        error: String,
        at_ms: u64,
    },
    /// Watchdog reclaimed an expired lease and requeued the job.
    JobReclaimRequeued {
        job_id: JobId,
        last_owner: WorkerId,
        run_after_ms: u64,
        at_ms: u64,
    },
    /// Watchdog reclaimed an expired lease on a job out of attempts.
    JobReclaimDeadlettered {
        job_id: JobId,
        last_owner: WorkerId,
        at_ms: u64,
    },
    /// Manual operator intervention: deadlettered job back to the queue.
    DeadletterRequeued {
        job_id: JobId,
        at_ms: u64,
    },
    /// Terminal job removed after its retention window.
    JobPruned {
        job_id: JobId,
    },

    // Resource locks
    LockAcquired {
        lock: ResourceLock,
    },
    LockRenewed {
        resource_key: String,
        expires_at_ms: u64,
    },
    LockReleased {
        resource_key: String,
    },

    // Idempotency markers
    IdempotencyRecorded {
        record: IdempotencyRecord,
    },
    IdempotencyPruned {
        keys: Vec<String>,
    },

    // Change journal
    JournalAppended {
        entry: JournalEntry,
    },
    JournalPruned {
        keys: Vec<String>,
    },
}

impl StoreEvent {
    /// Short event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreEvent::JobEnqueued { .. } => "job_enqueued",
            StoreEvent::JobLeased { .. } => "job_leased",
            StoreEvent::JobRunning { .. } => "job_running",
            StoreEvent::LeaseRenewed { .. } => "lease_renewed",
            StoreEvent::JobSucceeded { .. } => "job_succeeded",
            StoreEvent::JobRequeued { .. } => "job_requeued",
            StoreEvent::JobNeedsReview { .. } => "job_needs_review",
            StoreEvent::JobDeadlettered { .. } => "job_deadlettered",
            StoreEvent::JobReclaimRequeued { .. } => "job_reclaim_requeued",
            StoreEvent::JobReclaimDeadlettered { .. } => "job_reclaim_deadlettered",
            StoreEvent::DeadletterRequeued { .. } => "deadletter_requeued",
            StoreEvent::JobPruned { .. } => "job_pruned",
            StoreEvent::LockAcquired { .. } => "lock_acquired",
            StoreEvent::LockRenewed { .. } => "lock_renewed",
            StoreEvent::LockReleased { .. } => "lock_released",
            StoreEvent::IdempotencyRecorded { .. } => "idempotency_recorded",
            StoreEvent::IdempotencyPruned { .. } => "idempotency_pruned",
            StoreEvent::JournalAppended { .. } => "journal_appended",
            StoreEvent::JournalPruned { .. } => "journal_pruned",
        }
    }
}
