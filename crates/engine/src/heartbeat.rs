// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat: periodic lease/lock renewal while a worker holds a job.
//!
//! Renewal is margin-based: the heartbeat only writes when the remaining
//! TTL drops below the configured margin, not on every tick. A refused
//! renewal means ownership was lost; the heartbeat signals that and stops,
//! and the worker must abandon the attempt without writing terminal state.

use crate::error::EngineError;
use curator_core::{Clock, CuratorConfig, JobId, WorkerId};
use curator_store::{JobQueue, LockManager};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What one heartbeat pass observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Ownership intact; renewed if the margin required it.
    Held,
    /// Lease or lock ownership lost. Stop working.
    Lost,
}

pub struct Heartbeat<C: Clock> {
    queue: Arc<JobQueue<C>>,
    locks: Arc<LockManager<C>>,
    clock: C,
    job_id: JobId,
    worker_id: WorkerId,
    resource_key: Option<String>,
    margin_ms: u64,
    interval_ms: u64,
}

impl<C: Clock + 'static> Heartbeat<C> {
    pub fn new(
        queue: Arc<JobQueue<C>>,
        locks: Arc<LockManager<C>>,
        clock: C,
        config: &CuratorConfig,
        job_id: JobId,
        worker_id: WorkerId,
        resource_key: Option<String>,
    ) -> Self {
        Self {
            queue,
            locks,
            clock,
            job_id,
            worker_id,
            resource_key,
            margin_ms: config.renewal_margin_ms(),
            interval_ms: config.heartbeat_interval_ms,
        }
    }

    /// One heartbeat pass: renew lease and lock when their remaining TTL is
    /// inside the margin.
    pub fn beat(&self) -> Result<Beat, EngineError> {
        let now = self.clock.epoch_ms();

        let Some(job) = self.queue.get(&self.job_id) else {
            return Ok(Beat::Lost);
        };
        if !job.held_by(&self.worker_id) {
            return Ok(Beat::Lost);
        }
        let expiring = job
            .lease_expires_at_ms
            .map_or(true, |expires| expires.saturating_sub(now) < self.margin_ms);
        if expiring && !self.queue.renew_lease(&self.job_id, &self.worker_id)? {
            return Ok(Beat::Lost);
        }

        if let Some(resource_key) = &self.resource_key {
            let Some(lock) = self.locks.get(resource_key) else {
                return Ok(Beat::Lost);
            };
            if !lock.owned_by(&self.job_id, &self.worker_id, now) {
                return Ok(Beat::Lost);
            }
            let lock_expiring = lock.expires_at_ms.saturating_sub(now) < self.margin_ms;
            if lock_expiring && !self.locks.renew(resource_key, &self.job_id, &self.worker_id)? {
                return Ok(Beat::Lost);
            }
        }

        Ok(Beat::Held)
    }

    /// Run the heartbeat until `stop` is cancelled or ownership is lost.
    /// The returned handle's `lost` token fires on ownership loss.
    pub fn spawn(self, stop: CancellationToken) -> HeartbeatHandle {
        let lost = CancellationToken::new();
        let lost_signal = lost.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(self.interval_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => match self.beat() {
                        Ok(Beat::Held) => {}
                        Ok(Beat::Lost) => {
                            tracing::warn!(
                                job_id = %self.job_id,
                                worker_id = %self.worker_id,
                                "ownership lost, heartbeat stopping"
                            );
                            lost_signal.cancel();
                            break;
                        }
                        // Transient store trouble: keep beating, the lease
                        // margin absorbs a few missed renewals
                        Err(err) => {
                            tracing::warn!(job_id = %self.job_id, %err, "heartbeat error");
                        }
                    },
                }
            }
        });
        HeartbeatHandle { lost, handle }
    }
}

pub struct HeartbeatHandle {
    lost: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl HeartbeatHandle {
    /// True once the heartbeat observed ownership loss.
    pub fn lease_lost(&self) -> bool {
        self.lost.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the heartbeat task to exit. Call after cancelling the stop
    /// token; an abandoned heartbeat task is a defect.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
