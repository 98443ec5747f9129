use serde::{Deserialize, Serialize};

use crate::email::MailConfig;
use crate::error::{JobError, Result};
use crate::jobs::JobsConfig;
use crate::realtime::RealtimeConfig;
use crate::utils::get_env_with_prefix;

/// Main configuration of the job system
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl Config {
    /// Load every section from `COURSEFEED_`-prefixed environment variables
    pub fn from_env() -> Self {
        ConfigBuilder::new().from_env().config
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_jobs_config(mut self, jobs: JobsConfig) -> Self {
        self.config.jobs = jobs;
        self
    }

    pub fn with_mail_config(mut self, mail: MailConfig) -> Self {
        self.config.mail = mail;
        self
    }

    pub fn with_realtime_config(mut self, realtime: RealtimeConfig) -> Self {
        self.config.realtime = realtime;
        self
    }

    /// Load configuration from environment variables with COURSEFEED_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }

        self.config.jobs = JobsConfig::from_env();
        self.config.mail = MailConfig::from_env();
        self.config.realtime = RealtimeConfig::from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for an unknown log level, for job
    /// settings the worker pool cannot run with, or for a Redis backend
    /// without a URL.
    pub fn build(self) -> Result<Config> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(JobError::validation(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        self.config.jobs.validate()?;

        #[cfg(feature = "redis")]
        if self.config.jobs.backend == crate::jobs::JobBackend::Redis && self.config.jobs.redis_url.is_none() {
            return Err(JobError::validation("redis_url is required for the redis backend"));
        }

        if self.config.realtime.channel_capacity == 0 {
            return Err(JobError::validation("Realtime channel_capacity must be greater than 0"));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.jobs.max_attempts, 3);
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let err = ConfigBuilder::new().with_log_level("loud").build().unwrap_err();
        assert!(matches!(err, JobError::Validation(ref m) if m.contains("loud")));
    }

    #[test]
    fn test_rejects_invalid_jobs_config() {
        let jobs = JobsConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(ConfigBuilder::new().with_jobs_config(jobs).build().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{"logging": {"level": "debug"}}"#).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.jobs.workers_per_lane, 2);
        assert_eq!(config.mail.admin_recipients.len(), 2);
    }
}
