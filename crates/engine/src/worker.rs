// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker: leases jobs and drives them through plan, validate, apply.
//!
//! One attempt is strictly sequential: take the family lock, mark the job
//! running, start the heartbeat, then propose / compile / validate / apply.
//! If the heartbeat ever reports the lease lost, the attempt is abandoned
//! with no terminal write: whoever reclaimed the job owns its fate now.

use crate::apply::{ApplyEngine, ApplyResult};
use crate::catalog::Catalog;
use crate::compiler::compile;
use crate::error::EngineError;
use crate::heartbeat::{Heartbeat, HeartbeatHandle};
use crate::planner::Planner;
use crate::validator::Validator;
use curator_core::{AttemptId, AttemptLog, Clock, CuratorConfig, Job, WorkerId};
use curator_store::{CurationStore, JobQueue, LockManager};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How one attempt at a job ended.
#[derive(Debug)]
enum AttemptOutcome {
    Completed(ApplyResult),
    NeedsReview(Vec<String>),
    Failed(String),
    /// Lease lost mid-attempt. No terminal state is written.
    Abandoned,
}

pub struct Worker<P, K, C: Clock> {
    id: WorkerId,
    queue: Arc<JobQueue<C>>,
    locks: Arc<LockManager<C>>,
    planner: Arc<P>,
    apply: ApplyEngine<K, C>,
    validator: Validator,
    catalog: Arc<K>,
    clock: C,
    config: CuratorConfig,
}

impl<P, K, C> Worker<P, K, C>
where
    P: Planner,
    K: Catalog,
    C: Clock + 'static,
{
    pub fn new(
        store: Arc<CurationStore>,
        planner: Arc<P>,
        catalog: Arc<K>,
        clock: C,
        config: CuratorConfig,
    ) -> Self {
        Self {
            id: WorkerId::new(),
            queue: Arc::new(JobQueue::new(
                Arc::clone(&store),
                clock.clone(),
                config.clone(),
            )),
            locks: Arc::new(LockManager::new(
                Arc::clone(&store),
                clock.clone(),
                &config,
            )),
            apply: ApplyEngine::new(Arc::clone(&catalog), store, clock.clone(), &config),
            validator: Validator::new(&config),
            planner,
            catalog,
            clock,
            config,
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Poll lanes for work until cancelled. Sleeps for the poll interval
    /// when every lane comes up empty.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(worker_id = %self.id, "worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.poll_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
                    }
                }
                Err(err) => {
                    tracing::error!(worker_id = %self.id, %err, "poll failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
                    }
                }
            }
        }
        tracing::info!(worker_id = %self.id, "worker stopped");
    }

    /// Lease and process at most one job. Returns the attempt's execution
    /// record, or `None` when every lane came up empty.
    pub async fn poll_once(&self) -> Result<Option<AttemptLog>, EngineError> {
        for lane in &self.config.queue_lanes {
            if let Some(job) = self.queue.lease(&self.id, lane)? {
                return Ok(Some(self.process_job(job).await?));
            }
        }
        Ok(None)
    }

    async fn process_job(&self, job: Job) -> Result<AttemptLog, EngineError> {
        let attempt_id = AttemptId::new();
        let mut log = AttemptLog::begin(
            attempt_id.clone(),
            job.id.clone(),
            self.id.clone(),
            self.clock.epoch_ms(),
        );
        tracing::info!(
            worker_id = %self.id,
            job_id = %job.id,
            attempt_id = %attempt_id,
            job_type = %job.job_type.as_str(),
            "attempt started"
        );

        // Scoped jobs serialize on their family
        let resource_key = job
            .scope
            .family_key
            .as_ref()
            .map(|key| format!("family/{key}"));
        if let Some(key) = &resource_key {
            if !self.locks.acquire(key, &job.id, &self.id)? {
                // Contention burns an attempt; backoff spreads the retries
                tracing::info!(job_id = %job.id, resource = %key, "resource locked, requeueing");
                self.queue
                    .fail(&job.id, &self.id, "resource lock held by another job")?;
                log.error = Some("resource lock held by another job".to_string());
                log.finished_at_ms = Some(self.clock.epoch_ms());
                return Ok(log);
            }
        }

        self.queue.mark_running(&job.id, &self.id)?;

        let stop = CancellationToken::new();
        let heartbeat = Heartbeat::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.locks),
            self.clock.clone(),
            &self.config,
            job.id.clone(),
            self.id.clone(),
            resource_key.clone(),
        )
        .spawn(stop.clone());

        let outcome = self.execute(&job, &attempt_id, &heartbeat, &mut log).await;
        stop.cancel();
        let lease_lost = heartbeat.lease_lost();
        heartbeat.join().await;

        let outcome = match outcome {
            _ if lease_lost => AttemptOutcome::Abandoned,
            Ok(outcome) => outcome,
            Err(err) => AttemptOutcome::Failed(err.to_string()),
        };

        match outcome {
            AttemptOutcome::Completed(result) if result.success => {
                log.operations_applied = result.operations_applied;
                log.operations_skipped = result.operations_skipped;
                log.journal_id = result.journal_id.clone();
                self.queue
                    .complete(&job.id, &self.id, result.dry_run, Some(result.summary()))?;
            }
            AttemptOutcome::Completed(result) => {
                log.operations_applied = result.operations_applied;
                log.operations_skipped = result.operations_skipped;
                log.journal_id = result.journal_id.clone();
                log.error = Some(result.failure_summary());
                self.queue
                    .fail(&job.id, &self.id, &result.failure_summary())?;
            }
            AttemptOutcome::NeedsReview(errors) => {
                log.validation_errors = errors.clone();
                log.error = Some(errors.join("; "));
                self.queue.needs_review(&job.id, &self.id, errors)?;
            }
            AttemptOutcome::Failed(error) => {
                log.error = Some(error.clone());
                self.queue.fail(&job.id, &self.id, &error)?;
            }
            AttemptOutcome::Abandoned => {
                tracing::warn!(
                    worker_id = %self.id,
                    job_id = %job.id,
                    "lease lost mid-attempt, abandoning without terminal state"
                );
            }
        }

        if let Some(key) = &resource_key {
            self.locks.release(key, &job.id, &self.id)?;
        }
        log.finished_at_ms = Some(self.clock.epoch_ms());
        Ok(log)
    }

    /// Plan, compile, validate, apply. Domain refusals travel in the
    /// outcome; only infrastructure trouble is an `Err`.
    async fn execute(
        &self,
        job: &Job,
        attempt_id: &AttemptId,
        heartbeat: &HeartbeatHandle,
        log: &mut AttemptLog,
    ) -> Result<AttemptOutcome, EngineError> {
        let mut records = BTreeMap::new();
        for record_id in &job.scope.record_ids {
            match self.catalog.fetch(record_id).await {
                Ok(Some(record)) => {
                    records.insert(record_id.clone(), record);
                }
                Ok(None) => {}
                Err(err) => {
                    return Ok(AttemptOutcome::Failed(format!(
                        "failed to fetch {record_id}: {err}"
                    )));
                }
            }
        }

        let raw = match self.planner.propose(job, &records).await {
            Ok(raw) => raw,
            // Planner trouble is transient; retry with backoff
            Err(err) => return Ok(AttemptOutcome::Failed(err.to_string())),
        };

        // A plan we cannot even decode needs a human, not a retry
        let plan = match compile(&raw, job) {
            Ok(plan) => plan,
            Err(err) => return Ok(AttemptOutcome::NeedsReview(vec![err.to_string()])),
        };
        log.plan = Some(plan.clone());

        let validated = match self.validator.validate(plan) {
            Ok(validated) => validated,
            Err(result) => return Ok(AttemptOutcome::NeedsReview(result.errors)),
        };
        for warning in validated.warnings() {
            tracing::warn!(job_id = %job.id, %warning, "plan warning");
        }
        log.validation_warnings = validated.warnings().to_vec();

        if heartbeat.lease_lost() {
            return Ok(AttemptOutcome::Abandoned);
        }

        let result = self.apply.apply(&validated, job, attempt_id).await?;
        Ok(AttemptOutcome::Completed(result))
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
