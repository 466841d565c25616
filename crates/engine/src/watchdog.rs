// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watchdog: out-of-band recovery of work whose owner stopped renewing.
//!
//! The only staleness signal is an expired lease on a held job, never
//! elapsed wall-clock time: long-running legitimate jobs keep renewing.
//! Every sweep also accepts a dry-run flag so operators can inspect what
//! recovery would do before letting it write.

use crate::error::EngineError;
use curator_core::{Clock, CuratorConfig, Job, JobId, WorkerId};
use curator_store::{
    CurationStore, IdempotencyGuard, JobQueue, JournalWriter, LockManager, StoreEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What one stuck-job sweep did (or, on a dry run, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    pub requeued: Vec<JobId>,
    pub deadlettered: Vec<JobId>,
}

impl RecoverySummary {
    pub fn is_empty(&self) -> bool {
        self.requeued.is_empty() && self.deadlettered.is_empty()
    }
}

pub struct Watchdog<C: Clock> {
    store: Arc<CurationStore>,
    queue: JobQueue<C>,
    locks: LockManager<C>,
    guard: IdempotencyGuard<C>,
    journal: JournalWriter<C>,
    clock: C,
    config: CuratorConfig,
}

impl<C: Clock> Watchdog<C> {
    pub fn new(store: Arc<CurationStore>, clock: C, config: CuratorConfig) -> Self {
        Self {
            queue: JobQueue::new(Arc::clone(&store), clock.clone(), config.clone()),
            locks: LockManager::new(Arc::clone(&store), clock.clone(), &config),
            guard: IdempotencyGuard::new(Arc::clone(&store), clock.clone(), &config),
            journal: JournalWriter::new(Arc::clone(&store), clock.clone(), &config),
            store,
            clock,
            config,
        }
    }

    /// Reclaim jobs whose lease expired without renewal.
    ///
    /// Out of attempts means deadletter; otherwise the job goes back to the
    /// queue with backoff, recording the defaulting worker for forensics.
    /// The staleness check and the reclaim commit happen in one store
    /// transaction, so a worker renewing concurrently cannot be clobbered.
    pub fn recover_stuck_jobs(&self, dry_run: bool) -> Result<RecoverySummary, EngineError> {
        let now = self.clock.epoch_ms();
        let retry = self.config.retry.clone();
        let summary = self.store.transact(|tx| {
            // Staging needs the transaction mutably, so snapshot the stuck
            // jobs before touching it
            let stuck: Vec<Job> = tx
                .state()
                .jobs
                .values()
                .filter(|job| job.status.is_held() && job.lease_expired(now))
                .cloned()
                .collect();

            let mut summary = RecoverySummary::default();
            for job in stuck {
                let last_owner = job
                    .lease_owner
                    .clone()
                    .unwrap_or_else(|| WorkerId::from_string("wkr-unknown"));

                if job.attempts + 1 >= job.max_attempts {
                    summary.deadlettered.push(job.id.clone());
                    if !dry_run {
                        tx.stage(StoreEvent::JobReclaimDeadlettered {
                            job_id: job.id.clone(),
                            last_owner,
                            at_ms: now,
                        });
                    }
                } else {
                    summary.requeued.push(job.id.clone());
                    if !dry_run {
                        tx.stage(StoreEvent::JobReclaimRequeued {
                            job_id: job.id.clone(),
                            last_owner,
                            run_after_ms: retry.run_after(now, job.attempts),
                            at_ms: now,
                        });
                    }
                }
            }
            summary
        })?;

        if !summary.is_empty() {
            tracing::warn!(
                requeued = summary.requeued.len(),
                deadlettered = summary.deadlettered.len(),
                dry_run,
                "stuck jobs recovered"
            );
        }
        Ok(summary)
    }

    /// Delete expired resource locks. Safe alongside live workers: expiry
    /// is the only precondition.
    pub fn cleanup_expired_locks(&self, dry_run: bool) -> Result<usize, EngineError> {
        if dry_run {
            let now = self.clock.epoch_ms();
            return Ok(self
                .store
                .read(|state| state.locks.values().filter(|l| l.expired(now)).count()));
        }
        Ok(self.locks.purge_expired()?)
    }

    /// Delete idempotency markers past their TTL.
    pub fn cleanup_idempotency_records(&self, dry_run: bool) -> Result<usize, EngineError> {
        if dry_run {
            let now = self.clock.epoch_ms();
            return Ok(self
                .store
                .read(|state| state.idempotency.values().filter(|r| r.expired(now)).count()));
        }
        Ok(self.guard.prune_expired()?)
    }

    /// Delete journal entries past the retention window.
    pub fn cleanup_journal_entries(&self, dry_run: bool) -> Result<usize, EngineError> {
        if dry_run {
            let now = self.clock.epoch_ms();
            let retention = self.config.journal_retention_ms();
            return Ok(self.store.read(|state| {
                state
                    .journal
                    .values()
                    .filter(|e| e.recorded_at_ms.saturating_add(retention) < now)
                    .count()
            }));
        }
        Ok(self.journal.prune_expired()?)
    }

    /// Delete terminal jobs past the retention window.
    pub fn cleanup_terminal_jobs(&self, dry_run: bool) -> Result<usize, EngineError> {
        if dry_run {
            let now = self.clock.epoch_ms();
            let retention = self.config.job_retention_ms();
            return Ok(self.store.read(|state| {
                state
                    .jobs
                    .values()
                    .filter(|j| j.is_terminal() && j.updated_at_ms.saturating_add(retention) < now)
                    .count()
            }));
        }
        Ok(self.queue.prune_terminal()?)
    }

    /// One full maintenance pass: recovery plus all cleanups.
    pub fn sweep(&self) -> Result<RecoverySummary, EngineError> {
        let summary = self.recover_stuck_jobs(false)?;
        self.cleanup_expired_locks(false)?;
        self.cleanup_idempotency_records(false)?;
        self.cleanup_journal_entries(false)?;
        self.cleanup_terminal_jobs(false)?;
        Ok(summary)
    }

    /// Sweep periodically until cancelled. The interval is half the lease
    /// duration, so an expired lease is reclaimed within 1.5 leases.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = Duration::from_millis(self.config.lease_duration_ms() / 2);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.sweep() {
                        tracing::error!(%err, "watchdog sweep failed");
                    }
                }
            }
        }
        tracing::info!("watchdog stopped");
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
