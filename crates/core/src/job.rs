// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and status state machine.
//!
//! A [`Job`] is owned exclusively by the job queue: workers never write its
//! fields directly, they go through queue operations which commit atomic
//! conditional transitions to the durable store.

use crate::id::{JobId, WorkerId};
use serde::{Deserialize, Serialize};

/// Kind of curation work a job performs. Closed set; strings outside it are
/// preserved as [`JobType::Unknown`] so the rejection can be surfaced instead
/// of silently defaulting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobType {
    /// Curate one product family: dedupe names, align shared fields.
    FamilyCuration,
    /// Fill or correct fields on a single catalog record.
    RecordEnrichment,
    /// Merge duplicate records into a canonical survivor.
    DuplicateMerge,
    /// Unrecognized type string, kept verbatim for error reporting.
    Unknown(String),
}

impl JobType {
    pub fn parse(s: &str) -> Self {
        match s {
            "family_curation" => JobType::FamilyCuration,
            "record_enrichment" => JobType::RecordEnrichment,
            "duplicate_merge" => JobType::DuplicateMerge,
            other => JobType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobType::FamilyCuration => "family_curation",
            JobType::RecordEnrichment => "record_enrichment",
            JobType::DuplicateMerge => "duplicate_merge",
            JobType::Unknown(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, JobType::Unknown(_))
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(JobType::parse(&s))
    }
}

/// Whether the attempt may mutate the catalog or only preview changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    DryRun,
    Apply,
}

crate::simple_display! {
    ExecutionMode {
        DryRun => "dry_run",
        Apply => "apply",
    }
}

/// Target scope of a job: which records it is allowed to touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Family grouping key, when the job operates on a related-record group.
    /// Also the resource-lock key for family-scoped jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_key: Option<String>,
    /// Individual record identifiers in scope.
    #[serde(default)]
    pub record_ids: Vec<String>,
}

impl Scope {
    pub fn family(key: impl Into<String>) -> Self {
        Self { family_key: Some(key.into()), record_ids: Vec::new() }
    }

    pub fn records(ids: Vec<String>) -> Self {
        Self { family_key: None, record_ids: ids }
    }
}

/// Job lifecycle status.
///
/// ```text
/// queued → leased → running → {succeeded | succeeded_dry_run | failed
///                              | needs_review | deadletter}
/// failed → queued        (retry while attempts < max_attempts)
/// deadletter → queued    (manual requeue only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Leased,
    Running,
    Succeeded,
    SucceededDryRun,
    Failed,
    NeedsReview,
    Deadletter,
}

crate::simple_display! {
    JobStatus {
        Queued => "queued",
        Leased => "leased",
        Running => "running",
        Succeeded => "succeeded",
        SucceededDryRun => "succeeded_dry_run",
        Failed => "failed",
        NeedsReview => "needs_review",
        Deadletter => "deadletter",
    }
}

impl JobStatus {
    /// Terminal states: nothing but retention pruning (or a manual
    /// deadletter requeue) moves a job out of these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded
                | JobStatus::SucceededDryRun
                | JobStatus::NeedsReview
                | JobStatus::Deadletter
        )
    }

    /// States in which a worker holds (or believes it holds) the job.
    pub fn is_held(&self) -> bool {
        matches!(self, JobStatus::Leased | JobStatus::Running)
    }
}

/// A unit of curation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub scope: Scope,
    pub mode: ExecutionMode,
    /// Larger is more urgent. A hint for lease selection, not a guarantee.
    pub priority: i32,
    pub queue_lane: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_owner: Option<WorkerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at_ms: Option<u64>,
    /// Owner of the most recently expired lease, kept for forensics after
    /// watchdog reclamation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_lease_owner: Option<WorkerId>,
    /// Completed execution attempts.
    #[serde(default)]
    pub attempts: u32,
    pub max_attempts: u32,
    /// Earliest epoch-ms at which the job may be leased (retry backoff).
    #[serde(default)]
    pub run_after_ms: u64,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the lease deadline has passed (or no lease is held).
    pub fn lease_expired(&self, now_ms: u64) -> bool {
        match self.lease_expires_at_ms {
            Some(expires) => expires < now_ms,
            None => true,
        }
    }

    /// Lease-selection predicate: queued, past its retry delay, and not
    /// covered by a live lease left over from a previous attempt.
    pub fn leasable(&self, now_ms: u64) -> bool {
        self.status == JobStatus::Queued && self.run_after_ms <= now_ms && self.lease_expired(now_ms)
    }

    /// True when the given worker is the recorded lease owner and the job is
    /// still in a held state.
    pub fn held_by(&self, worker: &WorkerId) -> bool {
        self.status.is_held() && self.lease_owner.as_ref() == Some(worker)
    }

    /// Whether another retry is allowed after a failure.
    pub fn retries_remaining(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = JobId::from_string("job-test1"),
            queue_lane: String = "default",
        }
        set {
            job_type: JobType = JobType::FamilyCuration,
            status: JobStatus = JobStatus::Queued,
            scope: Scope = Scope::family("fam-1"),
            mode: ExecutionMode = ExecutionMode::Apply,
            priority: i32 = 0,
            attempts: u32 = 0,
            max_attempts: u32 = 3,
            run_after_ms: u64 = 0,
            created_at_ms: u64 = 1_000_000,
            updated_at_ms: u64 = 1_000_000,
        }
        option {
            lease_owner: WorkerId = None,
            lease_expires_at_ms: u64 = None,
            last_lease_owner: WorkerId = None,
            last_error: String = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
