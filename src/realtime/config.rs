//! Configuration for the real-time channel

use crate::utils::parse_env_with_prefix;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealtimeConfig {
    /// Maximum concurrent connections (0 = unlimited)
    #[serde(default)]
    pub max_connections: usize,

    /// How often the server pings each client
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Close connections that have not answered a ping for this long
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,

    /// Outbound messages buffered per connection before new ones are dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_connections: 0,
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl RealtimeConfig {
    /// Load real-time configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = parse_env_with_prefix("REALTIME_MAX_CONNECTIONS") {
            config.max_connections = n;
        }
        if let Some(secs) = parse_env_with_prefix("REALTIME_HEARTBEAT_INTERVAL_SECS") {
            config.heartbeat_interval_secs = secs;
        }
        if let Some(secs) = parse_env_with_prefix("REALTIME_HEARTBEAT_TIMEOUT_SECS") {
            config.heartbeat_timeout_secs = secs;
        }
        if let Some(n) = parse_env_with_prefix("REALTIME_CHANNEL_CAPACITY") {
            config.channel_capacity = n;
        }
        config
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_heartbeat_timeout_secs() -> u64 {
    60
}

fn default_channel_capacity() -> usize {
    1000
}
