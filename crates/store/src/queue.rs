// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable job queue with lease-based dispatch.
//!
//! All transitions go through [`CurationStore::transact`], so leasing is an
//! atomic conditional write: two workers polling the same lane can never
//! walk away with the same job.

use crate::event::StoreEvent;
use crate::store::{CurationStore, StoreError};
use curator_core::{Clock, CuratorConfig, ExecutionMode, Job, JobId, JobStatus, JobType, Scope, WorkerId};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {job_id} is not held by worker {worker_id}")]
    NotOwner { job_id: JobId, worker_id: WorkerId },
    #[error("unknown job type: {0}")]
    UnknownJobType(String),
    #[error("job {0} is not deadlettered")]
    NotDeadlettered(JobId),
}

/// Parameters for a new job.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub job_type: JobType,
    pub scope: Scope,
    pub mode: ExecutionMode,
    pub priority: i32,
    /// Defaults to the first configured lane.
    pub queue_lane: Option<String>,
    /// Defaults to the configured max_attempts.
    pub max_attempts: Option<u32>,
}

impl EnqueueRequest {
    pub fn new(job_type: JobType, scope: Scope, mode: ExecutionMode) -> Self {
        Self {
            job_type,
            scope,
            mode,
            priority: 0,
            queue_lane: None,
            max_attempts: None,
        }
    }
}

/// Point-in-time queue depth by status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub queued: usize,
    pub leased: usize,
    pub running: usize,
    pub succeeded: usize,
    pub succeeded_dry_run: usize,
    pub failed: usize,
    pub needs_review: usize,
    pub deadletter: usize,
}

pub struct JobQueue<C: Clock> {
    store: Arc<CurationStore>,
    clock: C,
    config: CuratorConfig,
}

impl<C: Clock> JobQueue<C> {
    pub fn new(store: Arc<CurationStore>, clock: C, config: CuratorConfig) -> Self {
        Self { store, clock, config }
    }

    /// Add a job to the queue. Unknown job types are rejected up front
    /// rather than poisoning a worker later.
    pub fn enqueue(&self, req: EnqueueRequest) -> Result<Job, QueueError> {
        if !req.job_type.is_known() {
            return Err(QueueError::UnknownJobType(req.job_type.as_str().to_string()));
        }
        let now = self.clock.epoch_ms();
        let lane = req
            .queue_lane
            .or_else(|| self.config.queue_lanes.first().cloned())
            .unwrap_or_else(|| "default".to_string());
        let job = Job {
            id: JobId::new(),
            job_type: req.job_type,
            status: JobStatus::Queued,
            scope: req.scope,
            mode: req.mode,
            priority: req.priority,
            queue_lane: lane,
            lease_owner: None,
            lease_expires_at_ms: None,
            last_lease_owner: None,
            attempts: 0,
            max_attempts: req.max_attempts.unwrap_or(self.config.max_attempts),
            run_after_ms: 0,
            created_at_ms: now,
            updated_at_ms: now,
            last_error: None,
        };
        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            mode = %job.mode,
            lane = %job.queue_lane,
            "job enqueued"
        );
        self.store.transact(|tx| {
            tx.stage(StoreEvent::JobEnqueued { job: job.clone() });
        })?;
        Ok(job)
    }

    /// Lease the most urgent leasable job in `lane` for `worker`, or None
    /// when nothing is ready.
    ///
    /// Selection prefers higher priority, then older jobs. Priority is a
    /// hint, not a strict guarantee across lanes.
    pub fn lease(&self, worker: &WorkerId, lane: &str) -> Result<Option<Job>, QueueError> {
        let now = self.clock.epoch_ms();
        let lease_expires = now + self.config.lease_duration_ms();

        let leased = self.store.transact(|tx| {
            let candidate = tx
                .state()
                .jobs
                .values()
                .filter(|job| job.queue_lane == lane && job.leasable(now))
                .max_by(|a, b| {
                    a.priority
                        .cmp(&b.priority)
                        .then(b.created_at_ms.cmp(&a.created_at_ms))
                        .then(b.id.as_str().cmp(a.id.as_str()))
                })
                .cloned();

            let Some(mut job) = candidate else {
                return None;
            };
            tx.stage(StoreEvent::JobLeased {
                job_id: job.id.clone(),
                worker_id: worker.clone(),
                lease_expires_at_ms: lease_expires,
                at_ms: now,
            });
            job.status = JobStatus::Leased;
            job.lease_owner = Some(worker.clone());
            job.lease_expires_at_ms = Some(lease_expires);
            job.updated_at_ms = now;
            Some(job)
        })?;

        if let Some(job) = &leased {
            tracing::info!(
                job_id = %job.id,
                worker_id = %worker,
                attempt = job.attempts + 1,
                "job leased"
            );
        }
        Ok(leased)
    }

    /// Mark a leased job as running. The caller must be the lease owner.
    pub fn mark_running(&self, job_id: &JobId, worker: &WorkerId) -> Result<(), QueueError> {
        let now = self.clock.epoch_ms();
        self.owned_transition(job_id, worker, StoreEvent::JobRunning {
            job_id: job_id.clone(),
            at_ms: now,
        })
    }

    /// Extend the lease for its current owner.
    ///
    /// Returns false (not an error) when the worker no longer owns the job,
    /// which tells the heartbeat to abandon the attempt.
    pub fn renew_lease(&self, job_id: &JobId, worker: &WorkerId) -> Result<bool, QueueError> {
        let now = self.clock.epoch_ms();
        let lease_expires = now + self.config.lease_duration_ms();
        let renewed = self.store.transact(|tx| {
            let Some(job) = tx.state().get_job(job_id.as_str()) else {
                return false;
            };
            if !job.held_by(worker) {
                return false;
            }
            tx.stage(StoreEvent::LeaseRenewed {
                job_id: job_id.clone(),
                worker_id: worker.clone(),
                lease_expires_at_ms: lease_expires,
                at_ms: now,
            });
            true
        })?;
        if !renewed {
            tracing::warn!(job_id = %job_id, worker_id = %worker, "lease renewal refused");
        }
        Ok(renewed)
    }

    /// Record a successful attempt and move the job to its terminal
    /// succeeded status.
    pub fn complete(
        &self,
        job_id: &JobId,
        worker: &WorkerId,
        dry_run: bool,
        summary: Option<String>,
    ) -> Result<(), QueueError> {
        let now = self.clock.epoch_ms();
        tracing::info!(job_id = %job_id, worker_id = %worker, dry_run, "job completed");
        self.owned_transition(job_id, worker, StoreEvent::JobSucceeded {
            job_id: job_id.clone(),
            dry_run,
            summary,
            at_ms: now,
        })
    }

    /// Record a failed attempt: requeue with backoff while retries remain,
    /// deadletter otherwise. Returns the resulting status.
    pub fn fail(
        &self,
        job_id: &JobId,
        worker: &WorkerId,
        error: &str,
    ) -> Result<JobStatus, QueueError> {
        let now = self.clock.epoch_ms();
        let outcome = self.store.transact(|tx| {
            let Some(job) = tx.state().get_job(job_id.as_str()) else {
                return Err(QueueError::NotFound(job_id.clone()));
            };
            if !job.held_by(worker) {
                return Err(QueueError::NotOwner {
                    job_id: job_id.clone(),
                    worker_id: worker.clone(),
                });
            }
            // attempts is incremented by the event; this failure is attempt
            // number job.attempts + 1
            if job.attempts + 1 < job.max_attempts {
                let run_after = self.config.retry.run_after(now, job.attempts);
                tx.stage(StoreEvent::JobRequeued {
                    job_id: job_id.clone(),
                    error: error.to_string(),
                    run_after_ms: run_after,
                    at_ms: now,
                });
                Ok(JobStatus::Queued)
            } else {
                tx.stage(StoreEvent::JobDeadlettered {
                    job_id: job_id.clone(),
                    error: error.to_string(),
                    at_ms: now,
                });
                Ok(JobStatus::Deadletter)
            }
        })??;

        match outcome {
            JobStatus::Deadletter => {
                tracing::warn!(job_id = %job_id, error, "job deadlettered")
            }
            _ => tracing::info!(job_id = %job_id, error, "job requeued for retry"),
        }
        Ok(outcome)
    }

    /// Park a job for human review after plan validation failed. Attempts
    /// are preserved; the job will not be retried automatically.
    pub fn needs_review(
        &self,
        job_id: &JobId,
        worker: &WorkerId,
        errors: Vec<String>,
    ) -> Result<(), QueueError> {
        let now = self.clock.epoch_ms();
        tracing::warn!(job_id = %job_id, ?errors, "job parked for review");
        self.owned_transition(job_id, worker, StoreEvent::JobNeedsReview {
            job_id: job_id.clone(),
            errors,
            at_ms: now,
        })
    }

    /// Manually move a deadlettered job back to the queue with a fresh
    /// attempt budget.
    pub fn requeue_deadletter(&self, job_id: &JobId) -> Result<(), QueueError> {
        let now = self.clock.epoch_ms();
        self.store.transact(|tx| {
            let Some(job) = tx.state().get_job(job_id.as_str()) else {
                return Err(QueueError::NotFound(job_id.clone()));
            };
            if job.status != JobStatus::Deadletter {
                return Err(QueueError::NotDeadlettered(job_id.clone()));
            }
            tx.stage(StoreEvent::DeadletterRequeued {
                job_id: job_id.clone(),
                at_ms: now,
            });
            Ok(())
        })??;
        tracing::info!(job_id = %job_id, "deadlettered job requeued");
        Ok(())
    }

    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.store.read(|state| state.get_job(job_id.as_str()).cloned())
    }

    pub fn stats(&self) -> QueueStats {
        self.store.read(|state| {
            let mut stats = QueueStats::default();
            for job in state.jobs.values() {
                match job.status {
                    JobStatus::Queued => stats.queued += 1,
                    JobStatus::Leased => stats.leased += 1,
                    JobStatus::Running => stats.running += 1,
                    JobStatus::Succeeded => stats.succeeded += 1,
                    JobStatus::SucceededDryRun => stats.succeeded_dry_run += 1,
                    JobStatus::Failed => stats.failed += 1,
                    JobStatus::NeedsReview => stats.needs_review += 1,
                    JobStatus::Deadletter => stats.deadletter += 1,
                }
            }
            stats
        })
    }

    /// Delete terminal jobs older than the retention window. Returns the
    /// number pruned.
    pub fn prune_terminal(&self) -> Result<usize, QueueError> {
        let now = self.clock.epoch_ms();
        let retention = self.config.job_retention_ms();
        let pruned = self.store.transact(|tx| {
            let expired: Vec<JobId> = tx
                .state()
                .jobs
                .values()
                .filter(|job| {
                    job.is_terminal() && job.updated_at_ms.saturating_add(retention) < now
                })
                .map(|job| job.id.clone())
                .collect();
            let count = expired.len();
            for job_id in expired {
                tx.stage(StoreEvent::JobPruned { job_id });
            }
            count
        })?;
        if pruned > 0 {
            tracing::info!(pruned, "terminal jobs pruned");
        }
        Ok(pruned)
    }

    /// Stage an owner-guarded transition event.
    fn owned_transition(
        &self,
        job_id: &JobId,
        worker: &WorkerId,
        event: StoreEvent,
    ) -> Result<(), QueueError> {
        self.store.transact(|tx| {
            let Some(job) = tx.state().get_job(job_id.as_str()) else {
                return Err(QueueError::NotFound(job_id.clone()));
            };
            if !job.held_by(worker) {
                return Err(QueueError::NotOwner {
                    job_id: job_id.clone(),
                    worker_id: worker.clone(),
                });
            }
            tx.stage(event);
            Ok(())
        })?
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
