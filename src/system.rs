//! Lifecycle of the embedded job system
//!
//! # Example
//!
//! ```rust,ignore
//! use coursefeed_jobs::{Config, JobContext, JobSystem};
//! use std::sync::Arc;
//!
//! let config = Config::from_env();
//! let ctx = JobContext::builder()
//!     .with_mail_config(config.mail.clone())
//!     .with_audit_store(audit_store)
//!     .build()?;
//! let system = JobSystem::start(&config.jobs, ctx).await?;
//!
//! // in request handlers
//! system.producer().notify_admin("Rust 101", 5, "alice@uni.edu").await?;
//!
//! system.shutdown().await;
//! ```

use crate::context::JobContext;
use crate::error::Result;
use crate::handlers;
use crate::jobs::{HandlerRegistry, InMemoryJobStore, JobBackend, JobsConfig, Lane, Producer, WorkerPool};
use crate::traits::job::{JobStore, LaneStats};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A running store + worker pool, and the producer that feeds it
pub struct JobSystem {
    store: Arc<dyn JobStore>,
    producer: Producer,
    registry: Arc<HandlerRegistry>,
    ctx: Arc<JobContext>,
    pool: WorkerPool,
}

impl JobSystem {
    pub fn builder(config: JobsConfig) -> JobSystemBuilder {
        JobSystemBuilder::new(config)
    }

    /// Start workers for every lane with the bundled handlers
    pub async fn start(config: &JobsConfig, ctx: JobContext) -> Result<Self> {
        Self::builder(config.clone()).with_context(ctx).start().await
    }

    /// Producer handle for request handlers; cheap to clone
    pub fn producer(&self) -> Producer {
        self.producer.clone()
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn context(&self) -> &Arc<JobContext> {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Job counts of every lane
    pub async fn stats(&self) -> Result<BTreeMap<Lane, LaneStats>> {
        let mut stats = BTreeMap::new();
        for lane in Lane::ALL {
            stats.insert(lane, self.store.stats(lane).await?);
        }
        Ok(stats)
    }

    /// Stop claiming and wait for in-flight jobs to finish
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }
}

/// Builder for [`JobSystem`]
#[must_use = "builder does nothing until you call start()"]
pub struct JobSystemBuilder {
    config: JobsConfig,
    store: Option<Arc<dyn JobStore>>,
    ctx: Option<JobContext>,
    registry: Option<HandlerRegistry>,
}

impl JobSystemBuilder {
    pub fn new(config: JobsConfig) -> Self {
        Self {
            config,
            store: None,
            ctx: None,
            registry: None,
        }
    }

    /// Use this store instead of the one named by `config.backend`
    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_context(mut self, ctx: JobContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Use these handlers instead of the bundled ones
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub async fn start(self) -> Result<JobSystem> {
        self.config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => open_store(&self.config)?,
        };
        let ctx = Arc::new(match self.ctx {
            Some(ctx) => ctx,
            None => JobContext::builder().build()?,
        });
        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let registry = HandlerRegistry::new();
                handlers::register_all(&registry).await;
                registry
            }
        };
        let registry = Arc::new(registry);

        let pool = WorkerPool::start(store.clone(), registry.clone(), ctx.clone(), &self.config);
        tracing::info!(
            backend = ?self.config.backend,
            workers = pool.worker_count(),
            "Job system started"
        );

        Ok(JobSystem {
            producer: Producer::from_config(store.clone(), &self.config),
            store,
            registry,
            ctx,
            pool,
        })
    }
}

fn open_store(config: &JobsConfig) -> Result<Arc<dyn JobStore>> {
    match config.backend {
        JobBackend::InMemory => Ok(Arc::new(InMemoryJobStore::with_history_limit(config.history_limit))),
        #[cfg(feature = "redis")]
        JobBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| crate::error::JobError::validation("redis_url is required for the redis backend"))?;
            Ok(Arc::new(crate::jobs::RedisJobStore::new(url)?))
        }
    }
}
