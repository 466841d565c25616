// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change journal records: the append-only audit trail of every mutation
//! attempt, with before/after snapshots for rollback.

use crate::id::{AttemptId, JobId, JournalId, WorkerId};
use crate::idempotency::IdempotencyKey;
use crate::plan::ChangePlan;
use serde::{Deserialize, Serialize};

/// Outcome of one operation within a job attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationOutcome {
    pub operation_index: usize,
    pub operation_type: String,
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
    pub rationale: String,
    pub success: bool,
    /// Set when the operation was skipped (e.g. already applied) rather
    /// than executed.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub executed_at_ms: u64,
}

/// Durable audit record for one job attempt. Never mutated after write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub id: JournalId,
    pub job_id: JobId,
    pub attempt_id: AttemptId,
    pub operations: Vec<OperationOutcome>,
    pub recorded_at_ms: u64,
}

impl JournalEntry {
    /// Storage key: one entry set per (job_id, attempt_id).
    pub fn storage_key(&self) -> String {
        journal_key(&self.job_id, &self.attempt_id)
    }
}

pub fn journal_key(job_id: &JobId, attempt_id: &AttemptId) -> String {
    format!("{}_{}", job_id.as_str(), attempt_id.as_str())
}

/// Per-lease execution record kept by the worker for a single attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptLog {
    pub attempt_id: AttemptId,
    pub job_id: JobId,
    pub worker_id: WorkerId,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    /// Compiled plan, once the attempt got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ChangePlan>,
    /// Validator findings surfaced during this attempt.
    #[serde(default)]
    pub validation_errors: Vec<String>,
    #[serde(default)]
    pub validation_warnings: Vec<String>,
    #[serde(default)]
    pub operations_applied: u32,
    #[serde(default)]
    pub operations_skipped: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_id: Option<JournalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptLog {
    /// Start a log for a fresh attempt; the worker fills in the rest as the
    /// attempt progresses.
    pub fn begin(attempt_id: AttemptId, job_id: JobId, worker_id: WorkerId, now_ms: u64) -> Self {
        Self {
            attempt_id,
            job_id,
            worker_id,
            started_at_ms: now_ms,
            finished_at_ms: None,
            plan: None,
            validation_errors: Vec::new(),
            validation_warnings: Vec::new(),
            operations_applied: 0,
            operations_skipped: 0,
            journal_id: None,
            error: None,
        }
    }
}
