// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    family = { "family_curation", JobType::FamilyCuration },
    enrich = { "record_enrichment", JobType::RecordEnrichment },
    merge = { "duplicate_merge", JobType::DuplicateMerge },
)]
fn job_type_parses_known_strings(s: &str, expected: JobType) {
    assert_eq!(JobType::parse(s), expected);
    assert_eq!(JobType::parse(s).as_str(), s);
}

#[test]
fn job_type_preserves_unknown_strings() {
    let t = JobType::parse("reticulate_splines");
    assert_eq!(t, JobType::Unknown("reticulate_splines".to_string()));
    assert!(!t.is_known());
    // Round-trips through serde without losing the original string
    let json = serde_json::to_string(&t).unwrap();
    assert_eq!(json, "\"reticulate_splines\"");
    let back: JobType = serde_json::from_str(&json).unwrap();
    assert_eq!(back, t);
}

#[parameterized(
    succeeded = { JobStatus::Succeeded, true },
    succeeded_dry = { JobStatus::SucceededDryRun, true },
    needs_review = { JobStatus::NeedsReview, true },
    deadletter = { JobStatus::Deadletter, true },
    queued = { JobStatus::Queued, false },
    leased = { JobStatus::Leased, false },
    running = { JobStatus::Running, false },
    failed = { JobStatus::Failed, false },
)]
fn terminal_statuses(status: JobStatus, terminal: bool) {
    assert_eq!(status.is_terminal(), terminal);
}

#[test]
fn leasable_requires_queued_ready_and_unleased() {
    let now = 2_000_000;
    let job = Job::builder().build();
    assert!(job.leasable(now));

    // Not yet past its retry delay
    let delayed = Job::builder().run_after_ms(now + 1).build();
    assert!(!delayed.leasable(now));

    // Live lease left over blocks re-leasing
    let leased = Job::builder().lease_expires_at_ms(now + 60_000).build();
    assert!(!leased.leasable(now));

    // Expired lease does not block
    let expired = Job::builder().lease_expires_at_ms(now - 1).build();
    assert!(expired.leasable(now));
}

#[test]
fn held_by_checks_owner_and_status() {
    let me = WorkerId::from_string("wkr-me");
    let other = WorkerId::from_string("wkr-other");
    let job = Job::builder()
        .status(JobStatus::Leased)
        .lease_owner(me.clone())
        .build();

    assert!(job.held_by(&me));
    assert!(!job.held_by(&other));

    let done = Job::builder()
        .status(JobStatus::Succeeded)
        .lease_owner(me.clone())
        .build();
    assert!(!done.held_by(&me));
}

#[test]
fn retries_remaining_respects_max() {
    let job = Job::builder().attempts(2).max_attempts(3).build();
    assert!(job.retries_remaining());
    let exhausted = Job::builder().attempts(3).max_attempts(3).build();
    assert!(!exhausted.retries_remaining());
}

#[test]
fn job_serde_round_trip() {
    let job = Job::builder()
        .lease_owner(WorkerId::from_string("wkr-a"))
        .lease_expires_at_ms(9_000_000u64)
        .last_error("planner timeout")
        .build();
    let json = serde_json::to_string(&job).unwrap();
    let back: Job = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, job.id);
    assert_eq!(back.status, job.status);
    assert_eq!(back.lease_owner, job.lease_owner);
    assert_eq!(back.last_error, job.last_error);
}
