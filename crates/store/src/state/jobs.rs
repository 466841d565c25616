// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job event handlers.

use super::DurableState;
use crate::event::StoreEvent;
use curator_core::JobStatus;

pub(crate) fn apply(state: &mut DurableState, event: &StoreEvent) {
    match event {
        StoreEvent::JobEnqueued { job } => {
            // Idempotency: never clobber an existing job
            if !state.jobs.contains_key(job.id.as_str()) {
                state.jobs.insert(job.id.to_string(), job.clone());
            }
        }

        StoreEvent::JobLeased { job_id, worker_id, lease_expires_at_ms, at_ms } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                job.status = JobStatus::Leased;
                job.lease_owner = Some(worker_id.clone());
                job.lease_expires_at_ms = Some(*lease_expires_at_ms);
                job.updated_at_ms = *at_ms;
            }
        }

        StoreEvent::JobRunning { job_id, at_ms } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                job.status = JobStatus::Running;
                job.updated_at_ms = *at_ms;
            }
        }

        StoreEvent::LeaseRenewed { job_id, worker_id, lease_expires_at_ms, at_ms } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                // Renewal is only valid for the recorded owner
                if job.lease_owner.as_ref() == Some(worker_id) {
                    job.lease_expires_at_ms = Some(*lease_expires_at_ms);
                    job.updated_at_ms = *at_ms;
                }
            }
        }

        StoreEvent::JobSucceeded { job_id, dry_run, at_ms, .. } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                // Idempotency: only count the attempt on state transition
                if job.status.is_held() {
                    job.attempts += 1;
                }
                job.status =
                    if *dry_run { JobStatus::SucceededDryRun } else { JobStatus::Succeeded };
                job.last_error = None;
                clear_lease(job);
                job.updated_at_ms = *at_ms;
            }
        }

        StoreEvent::JobRequeued { job_id, error, run_after_ms, at_ms } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                if job.status.is_held() {
                    job.attempts += 1;
                }
                job.status = JobStatus::Queued;
                job.last_error = Some(error.clone());
                job.run_after_ms = *run_after_ms;
                clear_lease(job);
                job.updated_at_ms = *at_ms;
            }
        }

        StoreEvent::JobNeedsReview { job_id, errors, at_ms } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                if job.status.is_held() {
                    job.attempts += 1;
                }
                job.status = JobStatus::NeedsReview;
                job.last_error = Some(errors.join("; "));
                clear_lease(job);
                job.updated_at_ms = *at_ms;
            }
        }

        StoreEvent::JobDeadlettered { job_id, error, at_ms } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                if job.status.is_held() {
                    job.attempts += 1;
                }
                job.status = JobStatus::Deadletter;
                job.last_error = Some(error.clone());
                clear_lease(job);
                job.updated_at_ms = *at_ms;
            }
        }

        StoreEvent::JobReclaimRequeued { job_id, last_owner, run_after_ms, at_ms } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                if job.status.is_held() {
                    job.attempts += 1;
                }
                job.status = JobStatus::Queued;
                job.run_after_ms = *run_after_ms;
                job.last_error = Some("lease expired without renewal".to_string());
                clear_lease(job);
                job.last_lease_owner = Some(last_owner.clone());
                job.updated_at_ms = *at_ms;
            }
        }

        StoreEvent::JobReclaimDeadlettered { job_id, last_owner, at_ms } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                if job.status.is_held() {
                    job.attempts += 1;
                }
                job.status = JobStatus::Deadletter;
                job.last_error = Some("lease expired with no attempts remaining".to_string());
                clear_lease(job);
                job.last_lease_owner = Some(last_owner.clone());
                job.updated_at_ms = *at_ms;
            }
        }

        StoreEvent::DeadletterRequeued { job_id, at_ms } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                if job.status == JobStatus::Deadletter {
                    job.status = JobStatus::Queued;
                    job.attempts = 0;
                    job.run_after_ms = 0;
                    job.last_error = None;
                    job.updated_at_ms = *at_ms;
                }
            }
        }

        StoreEvent::JobPruned { job_id } => {
            state.jobs.remove(job_id.as_str());
        }

        _ => {}
    }
}

fn clear_lease(job: &mut curator_core::Job) {
    if job.lease_owner.is_some() {
        job.last_lease_owner = job.lease_owner.take();
    }
    job.lease_expires_at_ms = None;
}
