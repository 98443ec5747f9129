//! Configuration for the background job system

use crate::error::{JobError, Result};
use crate::jobs::Lane;
use crate::traits::job::Backoff;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Job store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobBackend {
    /// In-process store (for development/testing)
    #[default]
    InMemory,
    /// Redis-backed store (for production)
    #[cfg(feature = "redis")]
    Redis,
}

/// Shape of the default retry delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Exponential,
    Fixed,
}

/// Configuration for background jobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Job store backend type
    #[serde(default)]
    pub backend: JobBackend,

    /// Redis connection URL (only used for Redis backend)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Consumers started for every lane unless overridden
    #[serde(default = "default_workers_per_lane")]
    pub workers_per_lane: usize,

    /// Per-lane consumer counts
    #[serde(default)]
    pub lane_workers: HashMap<Lane, usize>,

    /// Default attempt budget for new jobs
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Default backoff delay (the base for exponential backoff)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default)]
    pub backoff_kind: BackoffKind,

    /// Lease granted with every claim
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,

    /// How often a busy worker renews its lease
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,

    /// Idle wait between claim attempts on an empty lane
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Handler timeout for lanes without an override
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-lane handler timeouts
    #[serde(default)]
    pub lane_timeouts_ms: HashMap<Lane, u64>,

    /// Finished jobs kept for status queries (in-memory backend)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            backend: JobBackend::default(),
            redis_url: None,
            workers_per_lane: default_workers_per_lane(),
            lane_workers: HashMap::new(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            backoff_kind: BackoffKind::default(),
            lease_ms: default_lease_ms(),
            heartbeat_ms: default_heartbeat_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
            lane_timeouts_ms: HashMap::new(),
            history_limit: default_history_limit(),
        }
    }
}

impl JobsConfig {
    /// Load jobs configuration from environment variables
    ///
    /// Per-lane overrides use the lane name in upper snake case, e.g.
    /// `COURSEFEED_JOBS_TIMEOUT_MS_SEND_REPORT=120000`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(backend) = get_env_with_prefix("JOBS_BACKEND") {
            config.backend = match backend.to_lowercase().as_str() {
                #[cfg(feature = "redis")]
                "redis" => JobBackend::Redis,
                _ => JobBackend::InMemory,
            };
        }

        config.redis_url = get_env_with_prefix("JOBS_REDIS_URL").or_else(|| get_env_with_prefix("REDIS_URL"));

        if let Some(n) = parse_env_with_prefix("JOBS_WORKERS_PER_LANE") {
            config.workers_per_lane = n;
        }
        if let Some(n) = parse_env_with_prefix("JOBS_MAX_ATTEMPTS") {
            config.max_attempts = n;
        }
        if let Some(ms) = parse_env_with_prefix("JOBS_BACKOFF_MS") {
            config.backoff_ms = ms;
        }
        if let Some(kind) = get_env_with_prefix("JOBS_BACKOFF_KIND") {
            config.backoff_kind = match kind.to_lowercase().as_str() {
                "fixed" => BackoffKind::Fixed,
                _ => BackoffKind::Exponential,
            };
        }
        if let Some(ms) = parse_env_with_prefix("JOBS_LEASE_MS") {
            config.lease_ms = ms;
        }
        if let Some(ms) = parse_env_with_prefix("JOBS_HEARTBEAT_MS") {
            config.heartbeat_ms = ms;
        }
        if let Some(ms) = parse_env_with_prefix("JOBS_POLL_INTERVAL_MS") {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = parse_env_with_prefix("JOBS_TIMEOUT_MS") {
            config.timeout_ms = ms;
        }
        if let Some(n) = parse_env_with_prefix("JOBS_HISTORY_LIMIT") {
            config.history_limit = n;
        }

        for lane in Lane::ALL {
            let suffix = env_suffix(lane);
            if let Some(n) = parse_env_with_prefix(&format!("JOBS_WORKERS_{}", suffix)) {
                config.lane_workers.insert(lane, n);
            }
            if let Some(ms) = parse_env_with_prefix(&format!("JOBS_TIMEOUT_MS_{}", suffix)) {
                config.lane_timeouts_ms.insert(lane, ms);
            }
        }

        config
    }

    /// Reject settings the worker pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(JobError::validation("max_attempts must be at least 1"));
        }
        if self.lease_ms == 0 {
            return Err(JobError::validation("lease_ms must be positive"));
        }
        if self.heartbeat_ms == 0 || self.heartbeat_ms >= self.lease_ms {
            return Err(JobError::validation("heartbeat_ms must be positive and shorter than lease_ms"));
        }
        Ok(())
    }

    /// Backoff applied to jobs enqueued without an explicit policy
    pub fn default_backoff(&self) -> Backoff {
        let delay = Duration::from_millis(self.backoff_ms);
        match self.backoff_kind {
            BackoffKind::Exponential => Backoff::exponential(delay),
            BackoffKind::Fixed => Backoff::fixed(delay),
        }
    }

    pub fn workers_for(&self, lane: Lane) -> usize {
        self.lane_workers.get(&lane).copied().unwrap_or(self.workers_per_lane)
    }

    pub fn timeout_for(&self, lane: Lane) -> Duration {
        Duration::from_millis(self.lane_timeouts_ms.get(&lane).copied().unwrap_or(self.timeout_ms))
    }

    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn env_suffix(lane: Lane) -> String {
    lane.as_str().replace('-', "_").to_uppercase()
}

fn default_workers_per_lane() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_lease_ms() -> u64 {
    30_000
}

fn default_heartbeat_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_history_limit() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JobsConfig::default();
        assert_eq!(config.backend, JobBackend::InMemory);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.default_backoff(), Backoff::exponential(Duration::from_secs(1)));
        assert_eq!(config.lease(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lane_overrides() {
        let mut config = JobsConfig::default();
        config.lane_workers.insert(Lane::Analytics, 1);
        config.lane_timeouts_ms.insert(Lane::SendReport, 120_000);

        assert_eq!(config.workers_for(Lane::Analytics), 1);
        assert_eq!(config.workers_for(Lane::SendEmail), 2);
        assert_eq!(config.timeout_for(Lane::SendReport), Duration::from_secs(120));
        assert_eq!(config.timeout_for(Lane::NotifyAdmin), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = JobsConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(JobError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_heartbeat_longer_than_lease() {
        let config = JobsConfig {
            lease_ms: 1000,
            heartbeat_ms: 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixed_backoff_kind() {
        let config = JobsConfig {
            backoff_kind: BackoffKind::Fixed,
            backoff_ms: 5000,
            ..Default::default()
        };
        assert_eq!(config.default_backoff(), Backoff::fixed(Duration::from_secs(5)));
    }

    #[test]
    fn test_env_suffix() {
        assert_eq!(env_suffix(Lane::SendReport), "SEND_REPORT");
        assert_eq!(env_suffix(Lane::Analytics), "ANALYTICS");
    }

    #[test]
    fn test_deserialize_lane_keys() {
        let config: JobsConfig =
            serde_json::from_str(r#"{"lane_timeouts_ms": {"send-report": 5000}, "backend": "in_memory"}"#).unwrap();
        assert_eq!(config.timeout_for(Lane::SendReport), Duration::from_secs(5));
        assert_eq!(config.workers_per_lane, 2);
    }
}
