use crate::{
    audit::{AuditAction, AuditStore, InMemoryAuditStore, ResourceType},
    context::JobContext,
    error::JobError,
    jobs::{HandlerRegistry, InMemoryJobStore, JobWorker, JobsConfig, Lane, WorkerPool},
    traits::job::{Backoff, FailOutcome, Job, JobState, JobStore},
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const LEASE: Duration = Duration::from_secs(30);

fn analytics_job(max_attempts: u32, backoff: Backoff) -> Job {
    Job::new(Lane::Analytics, json!({"task": "updateSentiment"}), max_attempts, backoff)
}

fn no_wait() -> Backoff {
    Backoff::fixed(Duration::ZERO)
}

fn fast_config() -> JobsConfig {
    JobsConfig {
        workers_per_lane: 1,
        poll_interval_ms: 10,
        ..Default::default()
    }
}

// Store semantics

#[tokio::test]
async fn test_claims_are_fifo_within_a_lane() {
    let store = InMemoryJobStore::new();
    let first = store.push(analytics_job(3, no_wait())).await.unwrap();
    let second = store.push(analytics_job(3, no_wait())).await.unwrap();

    let a = store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().unwrap();
    let b = store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().unwrap();
    assert_eq!(a.job_id(), first.id);
    assert_eq!(b.job_id(), second.id);
    assert!(store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().is_none());
}

#[tokio::test]
async fn test_lanes_are_independent() {
    let store = InMemoryJobStore::new();
    store.push(analytics_job(3, no_wait())).await.unwrap();

    assert!(store.claim(Lane::SendEmail, "w1", LEASE).await.unwrap().is_none());
    assert!(store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_claims_hand_out_one_job_once() {
    let store = Arc::new(InMemoryJobStore::new());
    store.push(analytics_job(3, no_wait())).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.claim(Lane::Analytics, &format!("w{}", i), LEASE).await.unwrap()
        }));
    }

    let mut claimed = 0;
    for task in tasks {
        if task.await.unwrap().is_some() {
            claimed += 1;
        }
    }
    assert_eq!(claimed, 1);
}

#[tokio::test]
async fn test_claim_marks_job_active() {
    let store = InMemoryJobStore::new();
    let handle = store.push(analytics_job(3, no_wait())).await.unwrap();
    let claim = store.claim(Lane::Analytics, "analytics-0", LEASE).await.unwrap().unwrap();
    assert_eq!(claim.attempt(), 1);

    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Active);
    assert_eq!(job.worker_id.as_deref(), Some("analytics-0"));
    assert_eq!(store.stats(Lane::Analytics).await.unwrap().active, 1);
}

#[tokio::test]
async fn test_stalled_job_is_reclaimed_without_consuming_an_attempt() {
    let store = InMemoryJobStore::new();
    let handle = store.push(analytics_job(3, no_wait())).await.unwrap();

    let stale = store.claim(Lane::Analytics, "w1", Duration::ZERO).await.unwrap().unwrap();
    sleep(Duration::from_millis(5)).await;
    let fresh = store.claim(Lane::Analytics, "w2", LEASE).await.unwrap().unwrap();

    assert_eq!(fresh.job_id(), handle.id);
    assert_ne!(fresh.lease_id, stale.lease_id);
    assert_eq!(fresh.job.attempts_made, 0);
    assert_eq!(fresh.attempt(), 1);

    // The first worker's outcome no longer counts
    assert!(matches!(store.complete(&stale).await, Err(JobError::LeaseLost(_))));
    assert!(matches!(
        store.fail(&stale, "late", true).await,
        Err(JobError::LeaseLost(_))
    ));
    assert!(matches!(
        store.heartbeat(&stale, LEASE).await,
        Err(JobError::LeaseLost(_))
    ));

    store.complete(&fresh).await.unwrap();
    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts_made, 1);
}

#[tokio::test]
async fn test_heartbeat_extends_lease() {
    let store = InMemoryJobStore::new();
    store.push(analytics_job(3, no_wait())).await.unwrap();
    let claim = store.claim(Lane::Analytics, "w1", Duration::from_millis(50)).await.unwrap().unwrap();

    let expires_at = store.heartbeat(&claim, LEASE).await.unwrap();
    assert!(expires_at > claim.expires_at);

    sleep(Duration::from_millis(80)).await;
    assert!(store.claim(Lane::Analytics, "w2", LEASE).await.unwrap().is_none());
    store.complete(&claim).await.unwrap();
}

#[tokio::test]
async fn test_failed_attempt_is_scheduled_with_backoff() {
    let store = InMemoryJobStore::new();
    let handle = store
        .push(analytics_job(3, Backoff::exponential(Duration::from_secs(3600))))
        .await
        .unwrap();
    let claim = store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().unwrap();

    let outcome = store.fail(&claim, "db down", true).await.unwrap();
    assert!(matches!(outcome, FailOutcome::Retrying { attempt: 1, .. }));

    let stats = store.stats(Lane::Analytics).await.unwrap();
    assert_eq!((stats.pending, stats.scheduled, stats.active), (0, 1, 0));
    assert!(store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().is_none());

    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts_made, 1);
    assert_eq!(job.last_error.as_deref(), Some("db down"));
}

#[tokio::test]
async fn test_attempts_exhausted_fails_permanently() {
    let store = InMemoryJobStore::new();
    let handle = store.push(analytics_job(2, no_wait())).await.unwrap();

    let claim = store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().unwrap();
    assert!(matches!(store.fail(&claim, "x", true).await.unwrap(), FailOutcome::Retrying { .. }));

    let claim = store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().unwrap();
    assert_eq!(claim.attempt(), 2);
    assert_eq!(store.fail(&claim, "x", true).await.unwrap(), FailOutcome::Failed { attempts: 2 });

    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert!(job.finished_at.is_some());
    assert_eq!(store.stats(Lane::Analytics).await.unwrap().failed, 1);
    assert!(store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().is_none());
}

#[tokio::test]
async fn test_history_limit_evicts_oldest_finished_jobs() {
    let store = InMemoryJobStore::with_history_limit(2);
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(store.push(analytics_job(1, no_wait())).await.unwrap().id);
        let claim = store.claim(Lane::Analytics, "w1", LEASE).await.unwrap().unwrap();
        store.complete(&claim).await.unwrap();
    }

    assert!(store.get(&ids[0]).await.unwrap().is_none());
    assert!(store.get(&ids[1]).await.unwrap().is_some());
    assert!(store.get(&ids[2]).await.unwrap().is_some());
    assert_eq!(store.stats(Lane::Analytics).await.unwrap().completed, 3);
}

// Workers

fn worker_for(
    store: Arc<InMemoryJobStore>,
    registry: HandlerRegistry,
    ctx: JobContext,
    config: &JobsConfig,
) -> JobWorker {
    let (worker, _rx) = JobWorker::new(
        store,
        Arc::new(registry),
        Arc::new(ctx),
        Lane::Analytics,
        "analytics-0".to_string(),
        config,
    );
    worker
}

#[tokio::test]
async fn test_worker_completes_job() {
    let store = Arc::new(InMemoryJobStore::new());
    let registry = HandlerRegistry::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    registry
        .register(Lane::Analytics, move |_job, _ctx| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .await;

    let handle = store.push(analytics_job(3, no_wait())).await.unwrap();
    let worker = worker_for(store.clone(), registry, JobContext::builder().build().unwrap(), &fast_config());

    assert_eq!(worker.process_next_job().await.unwrap(), Some(handle.id.clone()));
    assert_eq!(worker.process_next_job().await.unwrap(), None);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts_made, 1);
}

#[tokio::test]
async fn test_worker_retries_then_records_permanent_failure() {
    let store = Arc::new(InMemoryJobStore::new());
    let audit = Arc::new(InMemoryAuditStore::new());
    let registry = HandlerRegistry::new();
    registry
        .register(Lane::Analytics, |_job, _ctx| {
            Box::pin(async move { Err(JobError::transient("database unreachable")) })
        })
        .await;

    let handle = store.push(analytics_job(3, no_wait())).await.unwrap();
    let ctx = JobContext::builder().with_audit_store(audit.clone()).build().unwrap();
    let worker = worker_for(store.clone(), registry, ctx, &fast_config());

    for _ in 0..3 {
        assert!(worker.process_next_job().await.unwrap().is_some());
    }
    assert_eq!(worker.process_next_job().await.unwrap(), None);

    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts_made, 3);

    let records = audit.by_resource(&handle.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::JobFailed);
    assert_eq!(records[0].resource_type, ResourceType::Job);
    assert_eq!(records[0].details["lane"], "analytics");
    assert_eq!(records[0].details["attempts"], 3);
}

#[tokio::test]
async fn test_validation_error_is_not_retried() {
    let store = Arc::new(InMemoryJobStore::new());
    let registry = HandlerRegistry::new();
    registry
        .register(Lane::Analytics, |_job, _ctx| {
            Box::pin(async move { Err(JobError::validation("task: unknown")) })
        })
        .await;

    let handle = store.push(analytics_job(5, no_wait())).await.unwrap();
    let worker = worker_for(store.clone(), registry, JobContext::builder().build().unwrap(), &fast_config());
    worker.process_next_job().await.unwrap();

    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts_made, 1);
}

#[tokio::test]
async fn test_handler_timeout_counts_as_failure() {
    let store = Arc::new(InMemoryJobStore::new());
    let registry = HandlerRegistry::new();
    registry
        .register(Lane::Analytics, |_job, _ctx| {
            Box::pin(async move {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        })
        .await;

    let mut config = fast_config();
    config.lane_timeouts_ms.insert(Lane::Analytics, 20);

    let handle = store.push(analytics_job(1, no_wait())).await.unwrap();
    let worker = worker_for(store.clone(), registry, JobContext::builder().build().unwrap(), &config);
    worker.process_next_job().await.unwrap();

    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert!(job.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_heartbeat_keeps_long_job_claimed() {
    let store = Arc::new(InMemoryJobStore::new());
    let registry = HandlerRegistry::new();
    registry
        .register(Lane::Analytics, |_job, _ctx| {
            Box::pin(async move {
                sleep(Duration::from_millis(400)).await;
                Ok(())
            })
        })
        .await;

    let config = JobsConfig {
        lease_ms: 150,
        heartbeat_ms: 30,
        ..fast_config()
    };

    let handle = store.push(analytics_job(3, no_wait())).await.unwrap();
    let worker = worker_for(store.clone(), registry, JobContext::builder().build().unwrap(), &config);
    let running = tokio::spawn(async move { worker.process_next_job().await });

    sleep(Duration::from_millis(250)).await;
    assert!(store.claim(Lane::Analytics, "intruder", LEASE).await.unwrap().is_none());

    running.await.unwrap().unwrap();
    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts_made, 1);
}

#[tokio::test]
async fn test_pool_shutdown_finishes_in_flight_job() {
    let store = Arc::new(InMemoryJobStore::new());
    let registry = HandlerRegistry::new();
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    registry
        .register(Lane::Analytics, move |_job, _ctx| {
            let flag = flag.clone();
            Box::pin(async move {
                sleep(Duration::from_millis(200)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
        })
        .await;

    let handle = store.push(analytics_job(3, no_wait())).await.unwrap();
    let pool = WorkerPool::start_lanes(
        store.clone(),
        Arc::new(registry),
        Arc::new(JobContext::builder().build().unwrap()),
        &fast_config(),
        &[Lane::Analytics],
    );
    assert_eq!(pool.worker_count(), 1);

    sleep(Duration::from_millis(50)).await;
    pool.shutdown().await;

    assert!(finished.load(Ordering::SeqCst));
    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
}

#[tokio::test]
async fn test_pool_spawns_workers_per_lane() {
    let store = Arc::new(InMemoryJobStore::new());
    let mut config = fast_config();
    config.workers_per_lane = 2;
    config.lane_workers.insert(Lane::Analytics, 1);

    let pool = WorkerPool::start(
        store,
        Arc::new(HandlerRegistry::new()),
        Arc::new(JobContext::builder().build().unwrap()),
        &config,
    );
    assert_eq!(pool.worker_count(), 2 * (Lane::ALL.len() - 1) + 1);
    pool.shutdown().await;
}

async fn register_panicking_sentiment(registry: &HandlerRegistry, done: Arc<AtomicUsize>) {
    registry
        .register(Lane::Analytics, move |job, _ctx| {
            let done = done.clone();
            Box::pin(async move {
                if job.payload["task"] == "updateSentiment" {
                    panic!("sentiment model missing");
                }
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .await;
}

#[tokio::test]
async fn test_handler_panic_is_recorded_as_failed_attempt() {
    let store = Arc::new(InMemoryJobStore::new());
    let registry = HandlerRegistry::new();
    register_panicking_sentiment(&registry, Arc::new(AtomicUsize::new(0))).await;

    let handle = store.push(analytics_job(2, no_wait())).await.unwrap();
    let worker = worker_for(store.clone(), registry, JobContext::builder().build().unwrap(), &fast_config());

    assert!(worker.process_next_job().await.unwrap().is_some());
    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts_made, 1);

    assert!(worker.process_next_job().await.unwrap().is_some());
    let job = store.get(&handle.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts_made, 2);
    assert!(job.last_error.unwrap().contains("handler panicked: sentiment model missing"));
}

#[tokio::test]
async fn test_panicking_job_does_not_stop_the_lane() {
    let store = Arc::new(InMemoryJobStore::new());
    let registry = HandlerRegistry::new();
    let done = Arc::new(AtomicUsize::new(0));
    register_panicking_sentiment(&registry, done.clone()).await;

    let config = JobsConfig {
        workers_per_lane: 2,
        poll_interval_ms: 10,
        lease_ms: 200,
        heartbeat_ms: 50,
        ..Default::default()
    };

    let poison = store.push(analytics_job(2, no_wait())).await.unwrap();
    let good = store
        .push(Job::new(Lane::Analytics, json!({"task": "updateCourseAvg"}), 3, no_wait()))
        .await
        .unwrap();

    let pool = WorkerPool::start_lanes(
        store.clone(),
        Arc::new(registry),
        Arc::new(JobContext::builder().build().unwrap()),
        &config,
        &[Lane::Analytics],
    );

    for _ in 0..200 {
        let poison_done = store.get(&poison.id).await.unwrap().unwrap().state == JobState::Failed;
        if poison_done && done.load(Ordering::SeqCst) == 1 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    pool.shutdown().await;

    let job = store.get(&poison.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts_made, 2);
    assert_eq!(store.get(&good.id).await.unwrap().unwrap().state, JobState::Completed);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}
