//! coursefeed-jobs - background jobs for a student-course feedback service
//!
//! Request handlers enqueue work through a [`Producer`] and return at once;
//! a pool of per-lane workers claims the jobs and performs the side effects
//! (email, admin and student notifications, report delivery, analytics),
//! retrying failures with backoff and recovering jobs whose worker stalled.
//!
//! # Features
//!
//! - **Lanes**: `send-email`, `notify-admin`, `analytics`, `send-report`,
//!   `notify-student`, each with a validated payload schema
//! - **Stores**: in-memory, or Redis behind the `redis` feature
//! - **Mail**: SMTP via lettre (`smtp` feature, default) or console output
//! - **Real-time**: WebSocket notifications keyed by user identity
//! - **Audit**: append-only trail of job outcomes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use coursefeed_jobs::{Config, JobContext, JobSystem};
//!
//! #[tokio::main]
//! async fn main() -> coursefeed_jobs::Result<()> {
//!     coursefeed_jobs::init_tracing();
//!
//!     let config = Config::from_env();
//!     let ctx = JobContext::builder().with_mail_config(config.mail.clone()).build()?;
//!     let system = JobSystem::start(&config.jobs, ctx).await?;
//!
//!     system
//!         .producer()
//!         .send_email("student@uni.edu", "Welcome", "Thanks for signing up", None)
//!         .await?;
//!
//!     system.shutdown().await;
//!     Ok(())
//! }
//! ```

#![allow(async_fn_in_trait)] // async_trait macro handles Send/Sync bounds properly

pub mod analytics;
pub mod audit;
mod config;
mod context;
pub mod email;
mod error;
pub mod handlers;
pub mod health;
pub mod jobs;
pub mod realtime;
mod system;
pub mod testing;
pub mod traits;
mod utils;

// Re-exports for public API
pub use config::{Config, ConfigBuilder, LoggingConfig};
pub use context::{JobContext, JobContextBuilder};
pub use error::{JobError, Result};
pub use health::{ComponentHealth, HealthCheck, HealthChecker, HealthStatus};
pub use jobs::{HandlerRegistry, InMemoryJobStore, JobBackend, JobOptions, JobsConfig, Lane, Producer, WorkerPool};
#[cfg(feature = "redis")]
pub use jobs::RedisJobStore;
pub use system::{JobSystem, JobSystemBuilder};
pub use traits::job::{Backoff, Job, JobHandle, JobState, JobStore, LaneStats};
pub use traits::mailer::Mailer;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "coursefeed_jobs=debug")
/// - `COURSEFEED_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("COURSEFEED_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from a loaded [`Config`]
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
