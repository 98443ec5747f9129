//! Job store trait and the job record it manages
//!
//! The store is the only component that owns job state. Producers create
//! jobs, workers claim them and report outcomes, and the store applies the
//! retry policy and arbitrates claims so that a job instance is never active
//! in two workers at once.

use crate::error::Result;
use crate::jobs::Lane;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle state of a job. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting to be claimed (immediately or at `run_at`)
    Pending,
    /// Claimed by a worker that holds a lease on it
    Active,
    /// Handler succeeded. Terminal.
    Completed,
    /// Attempts exhausted or the payload can never succeed. Terminal.
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Delay policy between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry
    Fixed { delay_ms: u64 },
    /// `base_ms × 2^(attempt − 1)`
    Exponential { base_ms: u64 },
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Backoff::Fixed {
            delay_ms: delay.as_millis() as u64,
        }
    }

    pub fn exponential(base: Duration) -> Self {
        Backoff::Exponential {
            base_ms: base.as_millis() as u64,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { base_ms } => {
                let exponent = attempt.saturating_sub(1).min(32);
                Duration::from_millis(base_ms.saturating_mul(1u64 << exponent))
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential { base_ms: 1000 }
    }
}

/// A job as recorded in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque job identifier
    pub id: String,
    pub lane: Lane,
    /// Validated lane payload (JSON object)
    pub payload: serde_json::Value,
    /// Executions that have finished, successfully or not
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub state: JobState,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time the job may be claimed
    pub run_at: DateTime<Utc>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Worker holding the current lease, while active
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a pending job that is ready immediately
    pub fn new(lane: Lane, payload: serde_json::Value, max_attempts: u32, backoff: Backoff) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            lane,
            payload,
            attempts_made: 0,
            max_attempts,
            backoff,
            state: JobState::Pending,
            enqueued_at: now,
            run_at: now,
            last_error: None,
            worker_id: None,
            lease_expires_at: None,
            finished_at: None,
        }
    }

    /// Defer the first run
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.run_at = after(self.enqueued_at, delay);
        self
    }

    /// Whether another attempt is allowed after the current one fails
    pub fn should_retry(&self) -> bool {
        self.attempts_made < self.max_attempts
    }

    /// Record a finished successful execution
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.attempts_made += 1;
        self.state = JobState::Completed;
        self.finished_at = Some(now);
        self.release();
    }

    /// Record a finished failed execution and decide what happens next
    ///
    /// Returns the outcome and leaves the job either pending (with `run_at`
    /// pushed out by the backoff) or permanently failed.
    pub fn mark_failed(&mut self, error: &str, retryable: bool, now: DateTime<Utc>) -> FailOutcome {
        self.attempts_made += 1;
        self.last_error = Some(error.to_string());
        self.release();

        if retryable && self.should_retry() {
            let delay = self.backoff.delay_for(self.attempts_made);
            self.state = JobState::Pending;
            self.run_at = after(now, delay);
            FailOutcome::Retrying {
                attempt: self.attempts_made,
                retry_at: self.run_at,
            }
        } else {
            self.state = JobState::Failed;
            self.finished_at = Some(now);
            FailOutcome::Failed {
                attempts: self.attempts_made,
            }
        }
    }

    fn release(&mut self) {
        self.worker_id = None;
        self.lease_expires_at = None;
    }
}

/// `t + d`, saturating instead of panicking on overflow
pub(crate) fn after(t: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| t.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Reference returned on enqueue, usable to query job status
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub lane: Lane,
}

/// A time-bounded claim a worker holds on an active job
#[derive(Debug, Clone)]
pub struct Claim {
    /// Snapshot of the job at claim time
    pub job: Job,
    /// Identifies this particular claim; acknowledgements must present it
    pub lease_id: String,
    pub worker_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Claim {
    pub fn job_id(&self) -> &str {
        &self.job.id
    }

    /// 1-based number of the attempt this claim is executing
    pub fn attempt(&self) -> u32 {
        self.job.attempts_made + 1
    }
}

/// What the store did with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Rescheduled; `attempt` attempts have been used so far
    Retrying { attempt: u32, retry_at: DateTime<Utc> },
    /// Permanently failed after `attempts` attempts
    Failed { attempts: u32 },
}

/// Per-lane job counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaneStats {
    /// Ready to be claimed now
    pub pending: usize,
    /// Waiting for a delay or a retry backoff to elapse
    pub scheduled: usize,
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
}

/// Durable, shared, at-least-once job queue keyed by lane
///
/// Implementations must make `claim` atomic so two workers never hold an
/// active claim on the same job, and must tie `heartbeat`, `complete` and
/// `fail` to the lease presented in the [`Claim`]; a stale lease yields
/// [`JobError::LeaseLost`](crate::JobError::LeaseLost).
///
/// A claim whose lease expires without acknowledgement is stalled and
/// becomes claimable again without consuming an attempt.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Durably record a new job
    async fn push(&self, job: Job) -> Result<JobHandle>;

    /// Claim the oldest ready job in `lane`, if any, for `lease`
    async fn claim(&self, lane: Lane, worker_id: &str, lease: Duration) -> Result<Option<Claim>>;

    /// Extend the lease on an active claim; returns the new expiry
    async fn heartbeat(&self, claim: &Claim, lease: Duration) -> Result<DateTime<Utc>>;

    /// Mark the claimed job completed
    async fn complete(&self, claim: &Claim) -> Result<()>;

    /// Record a failed attempt and apply the retry policy
    async fn fail(&self, claim: &Claim, error: &str, retryable: bool) -> Result<FailOutcome>;

    /// Look up a job by id
    async fn get(&self, job_id: &str) -> Result<Option<Job>>;

    /// Counts for one lane
    async fn stats(&self, lane: Lane) -> Result<LaneStats>;

    /// Check if the store is reachable
    ///
    /// Cheap and synchronous; backends that cache their status refresh it
    /// in [`ping`](JobStore::ping).
    fn is_healthy(&self) -> bool;

    /// Probe the backend and report whether it answered
    async fn ping(&self) -> bool {
        self.is_healthy()
    }
}
