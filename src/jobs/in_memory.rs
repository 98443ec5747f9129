//! In-memory job store implementation
//!
//! This implementation keeps all job state in process memory and is suitable
//! for development, testing, and single-instance deployments. It is also the
//! reference for the claim/lease/retry semantics the Redis store mirrors.

use crate::error::{JobError, Result};
use crate::jobs::Lane;
use crate::traits::job::{after, Claim, FailOutcome, Job, JobHandle, JobState, JobStore, LaneStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Default maximum number of finished jobs kept for status queries
const DEFAULT_MAX_HISTORY_SIZE: usize = 10_000;

/// Bookkeeping for one active claim
#[derive(Debug, Clone)]
struct Lease {
    lease_id: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct LaneQueues {
    /// Ready job ids, oldest first
    pending: VecDeque<String>,
    /// Delayed job ids keyed by (run_at, insertion sequence)
    scheduled: BTreeMap<(DateTime<Utc>, u64), String>,
    /// Active job ids and their leases
    active: HashMap<String, Lease>,
    completed: u64,
    failed: u64,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Job>,
    lanes: HashMap<Lane, LaneQueues>,
    /// Finished job ids, oldest first; bounded by `max_history_size`
    history: VecDeque<String>,
    seq: u64,
}

impl Inner {
    fn lane(&mut self, lane: Lane) -> &mut LaneQueues {
        self.lanes.entry(lane).or_default()
    }

    fn enqueue_ready_or_scheduled(&mut self, job: &Job, now: DateTime<Utc>) {
        self.seq += 1;
        let seq = self.seq;
        let queues = self.lane(job.lane);
        if job.run_at <= now {
            queues.pending.push_back(job.id.clone());
        } else {
            queues.scheduled.insert((job.run_at, seq), job.id.clone());
        }
    }

    fn finish(&mut self, job_id: String, max_history_size: usize) {
        if self.history.len() >= max_history_size {
            if let Some(oldest) = self.history.pop_front() {
                self.jobs.remove(&oldest);
            }
        }
        self.history.push_back(job_id);
    }
}

/// In-memory job store
///
/// All state lives behind a single mutex, which makes `claim` and the
/// acknowledgements trivially atomic. Ready jobs are served FIFO per lane.
///
/// Delayed jobs and retries are promoted lazily when a worker asks the lane
/// for work, and expired leases are reclaimed at the same point, so no
/// background task is needed.
///
/// # Resource Limits
///
/// Finished jobs are retained for status queries up to a bounded history
/// (10,000 by default); older entries are discarded. Lane counters for
/// completed and failed jobs are not affected by the bound.
#[derive(Clone)]
pub struct InMemoryJobStore {
    inner: Arc<Mutex<Inner>>,
    max_history_size: usize,
}

impl InMemoryJobStore {
    /// Create a new in-memory job store
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_MAX_HISTORY_SIZE)
    }

    /// Create a new in-memory job store with a custom history limit
    pub fn with_history_limit(max_history_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_history_size: max_history_size.max(1),
        }
    }

    /// Move due scheduled jobs to pending and reclaim expired leases
    fn promote(inner: &mut Inner, lane: Lane, now: DateTime<Utc>) {
        let stalled = {
            let queues = inner.lane(lane);

            let due: Vec<(DateTime<Utc>, u64)> = queues
                .scheduled
                .range(..=(now, u64::MAX))
                .map(|(key, _)| *key)
                .collect();
            for key in due {
                if let Some(id) = queues.scheduled.remove(&key) {
                    queues.pending.push_back(id);
                }
            }

            let stalled: Vec<String> = queues
                .active
                .iter()
                .filter(|(_, lease)| lease.expires_at <= now)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &stalled {
                queues.active.remove(id);
                // Stalled jobs go to the front: they were claimed before anything pending
                queues.pending.push_front(id.clone());
            }
            stalled
        };

        for id in stalled {
            if let Some(job) = inner.jobs.get_mut(&id) {
                tracing::warn!(
                    job_id = %id,
                    lane = %lane,
                    worker_id = ?job.worker_id,
                    "Stalled job reclaimed"
                );
                job.state = JobState::Pending;
                job.worker_id = None;
                job.lease_expires_at = None;
            }
        }
    }

    /// Check the presented lease against the active one and release it
    fn take_lease(inner: &mut Inner, claim: &Claim) -> Result<()> {
        let queues = inner.lane(claim.job.lane);
        match queues.active.get(claim.job_id()) {
            Some(lease) if lease.lease_id == claim.lease_id => {
                queues.active.remove(claim.job_id());
                Ok(())
            }
            _ => Err(JobError::lease_lost(claim.job_id())),
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn push(&self, job: Job) -> Result<JobHandle> {
        let handle = JobHandle {
            id: job.id.clone(),
            lane: job.lane,
        };
        let mut inner = self.inner.lock().await;
        inner.enqueue_ready_or_scheduled(&job, Utc::now());
        inner.jobs.insert(job.id.clone(), job);
        Ok(handle)
    }

    async fn claim(&self, lane: Lane, worker_id: &str, lease: Duration) -> Result<Option<Claim>> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        Self::promote(&mut inner, lane, now);

        let job_id = match inner.lane(lane).pending.pop_front() {
            Some(id) => id,
            None => return Ok(None),
        };

        let expires_at = after(now, lease);
        let lease_id = Uuid::new_v4().to_string();
        inner.lane(lane).active.insert(
            job_id.clone(),
            Lease {
                lease_id: lease_id.clone(),
                expires_at,
            },
        );

        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| JobError::internal(format!("Pending job {} has no record", job_id)))?;
        job.state = JobState::Active;
        job.worker_id = Some(worker_id.to_string());
        job.lease_expires_at = Some(expires_at);

        Ok(Some(Claim {
            job: job.clone(),
            lease_id,
            worker_id: worker_id.to_string(),
            expires_at,
        }))
    }

    async fn heartbeat(&self, claim: &Claim, lease: Duration) -> Result<DateTime<Utc>> {
        let expires_at = after(Utc::now(), lease);
        let mut inner = self.inner.lock().await;

        let queues = inner.lane(claim.job.lane);
        match queues.active.get_mut(claim.job_id()) {
            Some(active) if active.lease_id == claim.lease_id => {
                active.expires_at = expires_at;
            }
            _ => return Err(JobError::lease_lost(claim.job_id())),
        }
        if let Some(job) = inner.jobs.get_mut(claim.job_id()) {
            job.lease_expires_at = Some(expires_at);
        }
        Ok(expires_at)
    }

    async fn complete(&self, claim: &Claim) -> Result<()> {
        let mut inner = self.inner.lock().await;
        Self::take_lease(&mut inner, claim)?;

        if let Some(job) = inner.jobs.get_mut(claim.job_id()) {
            job.mark_completed(Utc::now());
        }
        inner.lane(claim.job.lane).completed += 1;
        inner.finish(claim.job_id().to_string(), self.max_history_size);
        Ok(())
    }

    async fn fail(&self, claim: &Claim, error: &str, retryable: bool) -> Result<FailOutcome> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        Self::take_lease(&mut inner, claim)?;

        let job = inner
            .jobs
            .get_mut(claim.job_id())
            .ok_or_else(|| JobError::not_found(format!("Job {}", claim.job_id())))?;
        let outcome = job.mark_failed(error, retryable, now);
        let job = job.clone();

        match outcome {
            FailOutcome::Retrying { .. } => inner.enqueue_ready_or_scheduled(&job, now),
            FailOutcome::Failed { .. } => {
                inner.lane(job.lane).failed += 1;
                inner.finish(job.id, self.max_history_size);
            }
        }
        Ok(outcome)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(job_id).cloned())
    }

    async fn stats(&self, lane: Lane) -> Result<LaneStats> {
        let mut inner = self.inner.lock().await;
        let queues = inner.lane(lane);
        Ok(LaneStats {
            pending: queues.pending.len(),
            scheduled: queues.scheduled.len(),
            active: queues.active.len(),
            completed: queues.completed,
            failed: queues.failed,
        })
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
