//! Handler registry mapping lanes to handler functions
//!
//! Each lane has at most one handler. Workers look the handler up for every
//! claimed job, so registering before the pool starts is enough.

use crate::context::JobContext;
use crate::error::{JobError, Result};
use crate::jobs::Lane;
use crate::traits::job::Job;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// Type alias for job handler functions
///
/// Handlers receive the claimed [`Job`] (with its validated payload) and the
/// shared [`JobContext`], and decode the payload themselves.
type JobHandler = Arc<dyn Fn(Job, Arc<JobContext>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Registry of lane handlers, shared by all workers
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Arc<tokio::sync::RwLock<HashMap<Lane, JobHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
        }
    }

    /// Register the handler for a lane, replacing any previous one
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// registry.register(Lane::SendEmail, |job, ctx| {
    ///     Box::pin(async move {
    ///         let payload: SendEmailPayload = serde_json::from_value(job.payload)?;
    ///         deliver(&ctx, payload).await
    ///     })
    /// }).await;
    /// ```
    pub async fn register<F>(&self, lane: Lane, handler: F)
    where
        F: Fn(Job, Arc<JobContext>) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        let handler: JobHandler = Arc::new(handler);
        let mut handlers = self.handlers.write().await;
        handlers.insert(lane, handler);
    }

    /// Run the handler registered for the job's lane
    ///
    /// A lane without a handler is an `Internal` error.
    pub async fn execute(&self, job: Job, ctx: Arc<JobContext>) -> Result<()> {
        let handler = {
            let handlers = self.handlers.read().await;
            handlers
                .get(&job.lane)
                .cloned()
                .ok_or_else(|| JobError::internal(format!("No handler registered for lane: {}", job.lane)))?
        };

        handler(job, ctx).await
    }

    pub async fn is_registered(&self, lane: Lane) -> bool {
        let handlers = self.handlers.read().await;
        handlers.contains_key(&lane)
    }

    /// Lanes with a handler, in declaration order
    pub async fn registered_lanes(&self) -> Vec<Lane> {
        let handlers = self.handlers.read().await;
        Lane::ALL.iter().copied().filter(|lane| handlers.contains_key(lane)).collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::job::Backoff;
    use serde_json::json;

    #[tokio::test]
    async fn test_execute_dispatches_by_lane() {
        let registry = HandlerRegistry::new();
        registry
            .register(Lane::Analytics, |job, _ctx| {
                Box::pin(async move {
                    assert_eq!(job.lane, Lane::Analytics);
                    Ok(())
                })
            })
            .await;

        let ctx = Arc::new(JobContext::builder().build().unwrap());
        let job = Job::new(Lane::Analytics, json!({"task": "updateSentiment"}), 3, Backoff::default());
        assert!(registry.execute(job, ctx).await.is_ok());
        assert!(registry.is_registered(Lane::Analytics).await);
        assert_eq!(registry.registered_lanes().await, vec![Lane::Analytics]);
    }

    #[tokio::test]
    async fn test_missing_handler_is_internal_error() {
        let registry = HandlerRegistry::new();
        let ctx = Arc::new(JobContext::builder().build().unwrap());
        let job = Job::new(Lane::SendEmail, json!({}), 3, Backoff::default());
        assert!(matches!(registry.execute(job, ctx).await, Err(JobError::Internal(_))));
    }
}
