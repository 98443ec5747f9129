//! Redis-backed job store implementation
//!
//! Suitable for production: any number of worker processes can share one
//! Redis instance. Claim, heartbeat and acknowledgement each run as a Lua
//! script so the lease checks are atomic on the server.

use crate::error::{JobError, Result};
use crate::jobs::Lane;
use crate::traits::job::{after, Claim, FailOutcome, Job, JobHandle, JobState, JobStore, LaneStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_KEY_PREFIX: &str = "coursefeed:jobs";

/// Finished job records expire after a week by default
const DEFAULT_FINISHED_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// KEYS: pending, scheduled, active, leases
/// ARGV: now_ms, lease_expires_ms, lease_id
const CLAIM_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[2], id)
  redis.call('LPUSH', KEYS[1], id)
end
local stalled = redis.call('ZRANGEBYSCORE', KEYS[3], '-inf', ARGV[1])
for _, id in ipairs(stalled) do
  redis.call('ZREM', KEYS[3], id)
  redis.call('HDEL', KEYS[4], id)
  redis.call('RPUSH', KEYS[1], id)
end
local id = redis.call('RPOP', KEYS[1])
if not id then
  return {'', #stalled}
end
redis.call('ZADD', KEYS[3], ARGV[2], id)
redis.call('HSET', KEYS[4], id, ARGV[3])
return {id, #stalled}
"#;

/// KEYS: active, leases
/// ARGV: job_id, lease_id, lease_expires_ms
const HEARTBEAT_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[2], ARGV[1]) ~= ARGV[2] then
  return 0
end
redis.call('ZADD', KEYS[1], ARGV[3], ARGV[1])
return 1
"#;

/// KEYS: active, leases, job, scheduled, counter
/// ARGV: job_id, lease_id, job_json, mode ('retry' | 'done'), run_at_ms, finished_ttl_secs
const ACK_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[2], ARGV[1]) ~= ARGV[2] then
  return 0
end
redis.call('ZREM', KEYS[1], ARGV[1])
redis.call('HDEL', KEYS[2], ARGV[1])
redis.call('SET', KEYS[3], ARGV[3])
if ARGV[4] == 'retry' then
  redis.call('ZADD', KEYS[4], ARGV[5], ARGV[1])
else
  redis.call('INCR', KEYS[5])
  if tonumber(ARGV[6]) > 0 then
    redis.call('EXPIRE', KEYS[3], ARGV[6])
  end
end
return 1
"#;

/// Redis-backed job store
///
/// Uses Redis data structures, all under a configurable key prefix:
/// - `{prefix}:job:{id}` - JSON job record
/// - `{prefix}:{lane}:pending` - List of ready job ids (LPUSH in, RPOP out)
/// - `{prefix}:{lane}:scheduled` - Sorted set of delayed job ids (score = run-at ms)
/// - `{prefix}:{lane}:active` - Sorted set of claimed job ids (score = lease expiry ms)
/// - `{prefix}:{lane}:leases` - Hash of job id to current lease id
/// - `{prefix}:{lane}:completed` / `:failed` - Counters
///
/// Due scheduled jobs and expired leases are promoted inside the claim
/// script, so no background scheduler task is needed.
#[derive(Clone)]
pub struct RedisJobStore {
    client: redis::Client,
    prefix: String,
    finished_ttl_secs: u64,
    claim_script: redis::Script,
    heartbeat_script: redis::Script,
    ack_script: redis::Script,
    /// Cached health status (updated by ping operations)
    health_status: Arc<AtomicBool>,
}

impl RedisJobStore {
    /// Create a new Redis job store
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://:password@127.0.0.1:6379")
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| JobError::store_unavailable(format!("Failed to create Redis client: {}", e)))?;

        Ok(Self {
            client,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            finished_ttl_secs: DEFAULT_FINISHED_TTL_SECS,
            claim_script: redis::Script::new(CLAIM_SCRIPT),
            heartbeat_script: redis::Script::new(HEARTBEAT_SCRIPT),
            ack_script: redis::Script::new(ACK_SCRIPT),
            health_status: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Use a different key prefix (e.g. one per environment)
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// How long finished job records stay queryable; zero keeps them forever
    pub fn with_finished_ttl(mut self, ttl: Duration) -> Self {
        self.finished_ttl_secs = ttl.as_secs();
        self
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| JobError::store_unavailable(format!("Failed to get Redis connection: {}", e)))
    }

    fn job_key(&self, job_id: &str) -> String {
        format!("{}:job:{}", self.prefix, job_id)
    }

    fn lane_key(&self, lane: Lane, part: &str) -> String {
        format!("{}:{}:{}", self.prefix, lane, part)
    }

    async fn load(&self, conn: &mut redis::aio::MultiplexedConnection, job_id: &str) -> Result<Option<Job>> {
        let json: Option<String> = redis::cmd("GET").arg(self.job_key(job_id)).query_async(conn).await?;
        json.map(|j| {
            serde_json::from_str(&j)
                .map_err(|e| JobError::internal(format!("Failed to deserialize job {}: {}", job_id, e)))
        })
        .transpose()
    }

    async fn save(&self, conn: &mut redis::aio::MultiplexedConnection, job: &Job) -> Result<()> {
        let json = serialize(job)?;
        redis::cmd("SET")
            .arg(self.job_key(&job.id))
            .arg(json)
            .query_async::<()>(conn)
            .await?;
        Ok(())
    }

    /// Release the lease and write the job's next state in one step
    async fn acknowledge(&self, claim: &Claim, job: &Job, retry: bool) -> Result<()> {
        let lane = claim.job.lane;
        // Unused by the script when retrying
        let counter = if job.state == JobState::Completed {
            "completed"
        } else {
            "failed"
        };

        let mut conn = self.get_connection().await?;
        let acked: i64 = self
            .ack_script
            .key(self.lane_key(lane, "active"))
            .key(self.lane_key(lane, "leases"))
            .key(self.job_key(&job.id))
            .key(self.lane_key(lane, "scheduled"))
            .key(self.lane_key(lane, counter))
            .arg(&job.id)
            .arg(&claim.lease_id)
            .arg(serialize(job)?)
            .arg(if retry { "retry" } else { "done" })
            .arg(job.run_at.timestamp_millis())
            .arg(self.finished_ttl_secs)
            .invoke_async(&mut conn)
            .await?;

        if acked == 0 {
            return Err(JobError::lease_lost(claim.job_id()));
        }
        Ok(())
    }
}

fn serialize(job: &Job) -> Result<String> {
    serde_json::to_string(job).map_err(|e| JobError::internal(format!("Failed to serialize job: {}", e)))
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn push(&self, job: Job) -> Result<JobHandle> {
        let mut conn = self.get_connection().await?;
        self.save(&mut conn, &job).await?;

        if job.run_at <= Utc::now() {
            redis::cmd("LPUSH")
                .arg(self.lane_key(job.lane, "pending"))
                .arg(&job.id)
                .query_async::<()>(&mut conn)
                .await?;
        } else {
            redis::cmd("ZADD")
                .arg(self.lane_key(job.lane, "scheduled"))
                .arg(job.run_at.timestamp_millis())
                .arg(&job.id)
                .query_async::<()>(&mut conn)
                .await?;
        }

        Ok(JobHandle {
            id: job.id,
            lane: job.lane,
        })
    }

    async fn claim(&self, lane: Lane, worker_id: &str, lease: Duration) -> Result<Option<Claim>> {
        let now = Utc::now();
        let expires_at = after(now, lease);
        let lease_id = Uuid::new_v4().to_string();

        let mut conn = self.get_connection().await?;
        let (job_id, stalled): (String, i64) = self
            .claim_script
            .key(self.lane_key(lane, "pending"))
            .key(self.lane_key(lane, "scheduled"))
            .key(self.lane_key(lane, "active"))
            .key(self.lane_key(lane, "leases"))
            .arg(now.timestamp_millis())
            .arg(expires_at.timestamp_millis())
            .arg(&lease_id)
            .invoke_async(&mut conn)
            .await?;

        if stalled > 0 {
            tracing::warn!(lane = %lane, count = stalled, "Stalled job reclaimed");
        }
        if job_id.is_empty() {
            return Ok(None);
        }

        let mut job = self
            .load(&mut conn, &job_id)
            .await?
            .ok_or_else(|| JobError::internal(format!("Pending job {} has no record", job_id)))?;
        job.state = JobState::Active;
        job.worker_id = Some(worker_id.to_string());
        job.lease_expires_at = Some(expires_at);
        self.save(&mut conn, &job).await?;

        Ok(Some(Claim {
            job,
            lease_id,
            worker_id: worker_id.to_string(),
            expires_at,
        }))
    }

    async fn heartbeat(&self, claim: &Claim, lease: Duration) -> Result<DateTime<Utc>> {
        let expires_at = after(Utc::now(), lease);
        let mut conn = self.get_connection().await?;
        let renewed: i64 = self
            .heartbeat_script
            .key(self.lane_key(claim.job.lane, "active"))
            .key(self.lane_key(claim.job.lane, "leases"))
            .arg(claim.job_id())
            .arg(&claim.lease_id)
            .arg(expires_at.timestamp_millis())
            .invoke_async(&mut conn)
            .await?;

        if renewed == 0 {
            return Err(JobError::lease_lost(claim.job_id()));
        }
        Ok(expires_at)
    }

    async fn complete(&self, claim: &Claim) -> Result<()> {
        let mut job = claim.job.clone();
        job.mark_completed(Utc::now());
        self.acknowledge(claim, &job, false).await
    }

    async fn fail(&self, claim: &Claim, error: &str, retryable: bool) -> Result<FailOutcome> {
        let mut job = claim.job.clone();
        let outcome = job.mark_failed(error, retryable, Utc::now());
        let retry = matches!(outcome, FailOutcome::Retrying { .. });
        self.acknowledge(claim, &job, retry).await?;
        Ok(outcome)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let mut conn = self.get_connection().await?;
        self.load(&mut conn, job_id).await
    }

    async fn stats(&self, lane: Lane) -> Result<LaneStats> {
        let mut conn = self.get_connection().await?;
        let (pending, scheduled, active, completed, failed): (usize, usize, usize, Option<u64>, Option<u64>) =
            redis::pipe()
                .cmd("LLEN")
                .arg(self.lane_key(lane, "pending"))
                .cmd("ZCARD")
                .arg(self.lane_key(lane, "scheduled"))
                .cmd("ZCARD")
                .arg(self.lane_key(lane, "active"))
                .cmd("GET")
                .arg(self.lane_key(lane, "completed"))
                .cmd("GET")
                .arg(self.lane_key(lane, "failed"))
                .query_async(&mut conn)
                .await?;

        Ok(LaneStats {
            pending,
            scheduled,
            active,
            completed: completed.unwrap_or(0),
            failed: failed.unwrap_or(0),
        })
    }

    fn is_healthy(&self) -> bool {
        // Cached status from the last ping()
        self.health_status.load(Ordering::Acquire)
    }

    async fn ping(&self) -> bool {
        let healthy = match self.get_connection().await {
            Ok(mut conn) => {
                let result: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "Redis job store ping failed");
                }
                result.is_ok()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis job store ping failed");
                false
            }
        };
        self.health_status.store(healthy, Ordering::Release);
        healthy
    }
}
