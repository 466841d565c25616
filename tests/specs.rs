// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenarios driving the full stack: queue, worker,
//! planner, apply engine, watchdog, all over one durable store.

use curator_core::test_support::{raw_patch_op, raw_plan_json};
use curator_core::{
    CuratorConfig, ExecutionMode, FakeClock, JobStatus, JobType, RetryPolicy, Scope, WorkerId,
};
use curator_engine::{FakeCatalog, FakePlanner, Watchdog, Worker};
use curator_store::{CurationStore, EnqueueRequest, JobQueue};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    worker: Worker<FakePlanner, FakeCatalog, FakeClock>,
    watchdog: Watchdog<FakeClock>,
    queue: Arc<JobQueue<FakeClock>>,
    planner: Arc<FakePlanner>,
    catalog: Arc<FakeCatalog>,
    store: Arc<CurationStore>,
    clock: FakeClock,
    _dir: TempDir,
}

fn harness(config: CuratorConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CurationStore::open(dir.path()).unwrap());
    let clock = FakeClock::new();
    let planner = Arc::new(FakePlanner::new());
    let catalog = Arc::new(FakeCatalog::new());
    Harness {
        worker: Worker::new(
            Arc::clone(&store),
            Arc::clone(&planner),
            Arc::clone(&catalog),
            clock.clone(),
            config.clone(),
        ),
        watchdog: Watchdog::new(Arc::clone(&store), clock.clone(), config.clone()),
        queue: Arc::new(JobQueue::new(
            Arc::clone(&store),
            clock.clone(),
            config.clone(),
        )),
        planner,
        catalog,
        store,
        clock,
        _dir: dir,
    }
}

fn live_config() -> CuratorConfig {
    CuratorConfig {
        apply_enabled: true,
        retry: RetryPolicy::fixed(1_000),
        max_attempts: 3,
        ..CuratorConfig::default()
    }
}

fn three_record_plan() -> serde_json::Value {
    raw_plan_json(vec![
        raw_patch_op("rec-1", "name", serde_json::json!("Standard Name")),
        raw_patch_op("rec-2", "name", serde_json::json!("Standard Name")),
        raw_patch_op("rec-3", "name", serde_json::json!("Standard Name")),
    ])
}

#[tokio::test]
async fn retry_after_partial_failure_skips_already_applied_operations() {
    let h = harness(live_config());
    for id in ["rec-1", "rec-2", "rec-3"] {
        h.catalog.insert(id, serde_json::json!({"name": "old"}));
    }
    h.catalog.fail_on("rec-2");
    h.planner.push(Ok(three_record_plan()));
    h.planner.push(Ok(three_record_plan()));

    let job = h
        .queue
        .enqueue(EnqueueRequest::new(
            JobType::FamilyCuration,
            Scope::family("fam-1"),
            ExecutionMode::Apply,
        ))
        .unwrap();

    // First attempt: rec-1 and rec-3 land, rec-2 fails, job requeues
    assert!(h.worker.poll_once().await.unwrap().is_some());
    let after_first = h.queue.get(&job.id).unwrap();
    assert_eq!(after_first.status, JobStatus::Queued);
    assert_eq!(after_first.attempts, 1);
    assert!(after_first.last_error.as_deref().unwrap().contains("rec-2"));
    assert_eq!(h.catalog.record("rec-2").unwrap()["name"], serde_json::json!("old"));

    // Second attempt after the backoff window, with the fault cleared
    h.catalog.heal("rec-2");
    h.clock.advance(Duration::from_secs(2));
    let retry_log = h.worker.poll_once().await.unwrap().unwrap();
    // rec-1 and rec-3 were skipped via their idempotency markers
    assert_eq!(retry_log.operations_applied, 1);
    assert_eq!(retry_log.operations_skipped, 2);

    let done = h.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(done.last_error.is_none());
    for id in ["rec-1", "rec-2", "rec-3"] {
        assert_eq!(
            h.catalog.record(id).unwrap()["name"],
            serde_json::json!("Standard Name")
        );
    }

    // Already-applied operations were skipped, not re-executed: rec-1 and
    // rec-3 saw exactly one mutate each across both attempts
    let calls = h.catalog.mutate_calls();
    assert_eq!(calls.iter().filter(|t| *t == "rec-1").count(), 1);
    assert_eq!(calls.iter().filter(|t| *t == "rec-3").count(), 1);
    // rec-2: one failed call, one successful
    assert_eq!(calls.iter().filter(|t| *t == "rec-2").count(), 2);

    // Both attempts left a journal entry
    h.store.read(|state| {
        assert_eq!(state.journal.len(), 2);
        assert_eq!(state.idempotency.len(), 3);
    });
}

#[tokio::test]
async fn dry_run_job_previews_without_touching_anything() {
    let h = harness(live_config());
    for id in ["rec-1", "rec-2", "rec-3"] {
        h.catalog.insert(id, serde_json::json!({"name": "old"}));
    }
    h.planner.push(Ok(three_record_plan()));

    let job = h
        .queue
        .enqueue(EnqueueRequest::new(
            JobType::FamilyCuration,
            Scope::family("fam-1"),
            ExecutionMode::DryRun,
        ))
        .unwrap();
    assert!(h.worker.poll_once().await.unwrap().is_some());

    let done = h.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::SucceededDryRun);
    assert!(h.catalog.mutate_calls().is_empty());
    for id in ["rec-1", "rec-2", "rec-3"] {
        assert_eq!(h.catalog.record(id).unwrap()["name"], serde_json::json!("old"));
    }
    h.store.read(|state| {
        assert!(state.journal.is_empty());
        assert!(state.idempotency.is_empty());
        assert!(state.locks.is_empty());
    });
}

#[tokio::test]
async fn exhausted_attempts_deadletter_until_an_operator_requeues() {
    let h = harness(CuratorConfig {
        apply_enabled: true,
        retry: RetryPolicy::fixed(1_000),
        max_attempts: 2,
        ..CuratorConfig::default()
    });
    h.catalog.insert("rec-1", serde_json::json!({"name": "old"}));
    // No scripted responses: every propose fails

    let job = h
        .queue
        .enqueue(EnqueueRequest::new(
            JobType::FamilyCuration,
            Scope::family("fam-1"),
            ExecutionMode::Apply,
        ))
        .unwrap();

    assert!(h.worker.poll_once().await.unwrap().is_some());
    assert_eq!(h.queue.get(&job.id).unwrap().status, JobStatus::Queued);

    h.clock.advance(Duration::from_secs(2));
    assert!(h.worker.poll_once().await.unwrap().is_some());
    let dead = h.queue.get(&job.id).unwrap();
    assert_eq!(dead.status, JobStatus::Deadletter);
    assert_eq!(dead.attempts, 2);

    // The watchdog leaves deadlettered jobs alone, no matter how stale
    h.clock.advance(Duration::from_secs(3_600));
    assert!(h.watchdog.recover_stuck_jobs(false).unwrap().is_empty());
    assert_eq!(h.queue.get(&job.id).unwrap().status, JobStatus::Deadletter);

    // Manual requeue restores a full attempt budget and the job can succeed
    h.queue.requeue_deadletter(&job.id).unwrap();
    let requeued = h.queue.get(&job.id).unwrap();
    assert_eq!(requeued.status, JobStatus::Queued);
    assert_eq!(requeued.attempts, 0);

    h.planner.push(Ok(raw_plan_json(vec![raw_patch_op(
        "rec-1",
        "name",
        serde_json::json!("Standard Name"),
    )])));
    assert!(h.worker.poll_once().await.unwrap().is_some());
    assert_eq!(h.queue.get(&job.id).unwrap().status, JobStatus::Succeeded);
}

#[tokio::test]
async fn watchdog_reclaims_an_abandoned_lease_for_another_worker() {
    let h = harness(live_config());
    h.catalog.insert("rec-1", serde_json::json!({"name": "old"}));
    h.planner.push(Ok(raw_plan_json(vec![raw_patch_op(
        "rec-1",
        "name",
        serde_json::json!("Standard Name"),
    )])));

    let job = h
        .queue
        .enqueue(EnqueueRequest::new(
            JobType::FamilyCuration,
            Scope::family("fam-1"),
            ExecutionMode::Apply,
        ))
        .unwrap();

    // A worker leases the job and then disappears
    let ghost = WorkerId::from_string("wkr-ghost");
    h.queue.lease(&ghost, "default").unwrap().unwrap();
    h.clock.advance(Duration::from_secs(301));

    let summary = h.watchdog.recover_stuck_jobs(false).unwrap();
    assert_eq!(summary.requeued, vec![job.id.clone()]);
    let reclaimed = h.queue.get(&job.id).unwrap();
    assert_eq!(reclaimed.status, JobStatus::Queued);
    assert_eq!(reclaimed.last_lease_owner, Some(ghost));

    // Past the backoff, a healthy worker picks it up and finishes it
    h.clock.advance(Duration::from_secs(2));
    assert!(h.worker.poll_once().await.unwrap().is_some());
    assert_eq!(h.queue.get(&job.id).unwrap().status, JobStatus::Succeeded);
    assert_eq!(
        h.catalog.record("rec-1").unwrap()["name"],
        serde_json::json!("Standard Name")
    );
}

#[tokio::test]
async fn state_survives_restart_between_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let config = live_config();
    let clock = FakeClock::new();
    let job_id;

    {
        let store = Arc::new(CurationStore::open(dir.path()).unwrap());
        let queue = JobQueue::new(Arc::clone(&store), clock.clone(), config.clone());
        let job = queue
            .enqueue(EnqueueRequest::new(
                JobType::FamilyCuration,
                Scope::family("fam-1"),
                ExecutionMode::Apply,
            ))
            .unwrap();
        job_id = job.id;
        queue.lease(&WorkerId::from_string("wkr-a"), "default").unwrap().unwrap();
        // Process dies here; nothing was flushed beyond the WAL
    }

    let store = Arc::new(CurationStore::open(dir.path()).unwrap());
    let queue = JobQueue::new(Arc::clone(&store), clock.clone(), config.clone());
    let job = queue.get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Leased);
    assert_eq!(job.lease_owner, Some(WorkerId::from_string("wkr-a")));

    // After the lease lapses the restarted process reclaims it
    clock.advance(Duration::from_secs(301));
    let watchdog = Watchdog::new(store, clock.clone(), config);
    assert_eq!(watchdog.recover_stuck_jobs(false).unwrap().requeued, vec![job_id]);
}
