//! Background job system
//!
//! Jobs are keyed by [`Lane`]. The [`Producer`] validates and records them
//! in a [`JobStore`](crate::traits::job::JobStore) (in-memory or Redis), and
//! a [`WorkerPool`] claims them per lane and runs the handler registered in
//! the [`HandlerRegistry`], retrying failures with backoff.

mod config;
mod in_memory;
mod lane;
mod payload;
mod producer;
mod registry;
mod worker;

#[cfg(feature = "redis")]
mod redis;

#[cfg(test)]
mod tests;

pub use config::{BackoffKind, JobBackend, JobsConfig};
pub use in_memory::InMemoryJobStore;
pub use lane::Lane;
pub use payload::{
    AnalyticsPayload, AnalyticsTask, LanePayload, NotifyAdminPayload, NotifyStudentPayload, SendEmailPayload,
    SendReportPayload,
};
pub use producer::{JobOptions, Producer};
pub use registry::HandlerRegistry;
pub use worker::{JobWorker, WorkerPool};

#[cfg(feature = "redis")]
pub use redis::RedisJobStore;
