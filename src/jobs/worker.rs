//! Workers that claim jobs from a lane and run their handlers
//!
//! Each worker loops: claim the oldest ready job in its lane, run the
//! handler under a timeout while renewing the lease, then acknowledge the
//! outcome to the store. Shutdown is only observed between jobs, so the
//! in-flight job always finishes first.

use crate::audit::{AuditAction, ResourceType};
use crate::context::JobContext;
use crate::error::{JobError, Result};
use crate::jobs::config::JobsConfig;
use crate::jobs::registry::HandlerRegistry;
use crate::jobs::Lane;
use crate::traits::job::{Claim, FailOutcome, JobStore};
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{sleep, Duration, MissedTickBehavior};

/// Pause after a store error before polling again
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// A panicking handler counts as a transient failure of that attempt
fn panicked(panic: Box<dyn Any + Send>) -> JobError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    JobError::transient(format!("handler panicked: {}", message))
}

/// A single worker bound to one lane
pub struct JobWorker {
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    ctx: Arc<JobContext>,
    lane: Lane,
    worker_id: String,
    lease: Duration,
    heartbeat: Duration,
    poll_interval: Duration,
    timeout: Duration,
    shutdown_tx: mpsc::Sender<()>,
}

impl JobWorker {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        ctx: Arc<JobContext>,
        lane: Lane,
        worker_id: String,
        config: &JobsConfig,
    ) -> (Self, mpsc::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                store,
                registry,
                ctx,
                lane,
                worker_id,
                lease: config.lease(),
                heartbeat: config.heartbeat_interval().max(Duration::from_millis(1)),
                poll_interval: config.poll_interval(),
                timeout: config.timeout_for(lane),
                shutdown_tx,
            },
            shutdown_rx,
        )
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Run until shutdown is requested via the shutdown channel
    pub async fn start(self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(worker_id = %self.worker_id, lane = %self.lane, "Job worker started");

        loop {
            if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }

            match self.process_next_job().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = sleep(self.poll_interval) => {},
                    }
                }
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, lane = %self.lane, error = %e, "Error processing job");
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = sleep(ERROR_BACKOFF) => {},
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, lane = %self.lane, "Job worker stopped");
    }

    /// Claim and run the next ready job
    ///
    /// Returns the job id, or `None` when the lane had nothing ready. Handler
    /// failures are recorded in the store and are not errors here; only
    /// store failures are.
    pub async fn process_next_job(&self) -> Result<Option<String>> {
        let claim = match self.store.claim(self.lane, &self.worker_id, self.lease).await? {
            Some(claim) => claim,
            None => return Ok(None),
        };

        let job_id = claim.job_id().to_string();
        tracing::debug!(
            worker_id = %self.worker_id,
            job_id = %job_id,
            lane = %self.lane,
            attempt = claim.attempt(),
            "Job claimed"
        );

        match self.run_with_heartbeat(&claim).await {
            Ok(()) => match self.store.complete(&claim).await {
                Ok(()) => {
                    tracing::info!(
                        worker_id = %self.worker_id,
                        job_id = %job_id,
                        lane = %self.lane,
                        attempt = claim.attempt(),
                        "Job completed"
                    );
                }
                Err(JobError::LeaseLost(_)) => self.lease_lost(&claim),
                Err(e) => return Err(e),
            },
            Err(e) => self.handle_failure(&claim, e).await?,
        }

        Ok(Some(job_id))
    }

    /// Run the handler under the lane timeout, renewing the lease meanwhile
    async fn run_with_heartbeat(&self, claim: &Claim) -> Result<()> {
        let run = AssertUnwindSafe(self.registry.execute(claim.job.clone(), self.ctx.clone()))
            .catch_unwind()
            .map(|outcome| outcome.unwrap_or_else(|panic| Err(panicked(panic))));
        let handler = tokio::time::timeout(self.timeout, run);
        tokio::pin!(handler);

        let mut ticker = tokio::time::interval(self.heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the claim is fresh
        ticker.tick().await;

        loop {
            tokio::select! {
                result = &mut handler => {
                    return result.unwrap_or(Err(JobError::Timeout(self.timeout)));
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.store.heartbeat(claim, self.lease).await {
                        tracing::warn!(
                            worker_id = %self.worker_id,
                            job_id = %claim.job_id(),
                            lane = %self.lane,
                            error = %e,
                            "Lease renewal failed"
                        );
                    }
                }
            }
        }
    }

    async fn handle_failure(&self, claim: &Claim, err: JobError) -> Result<()> {
        let reason = err.to_string();
        let job_id = claim.job_id();

        match self.store.fail(claim, &reason, err.is_retryable()).await {
            Ok(FailOutcome::Retrying { attempt, retry_at }) => {
                tracing::warn!(
                    worker_id = %self.worker_id,
                    job_id = %job_id,
                    lane = %self.lane,
                    attempt,
                    retry_at = %retry_at,
                    error = %reason,
                    "Job failed, retry scheduled"
                );
            }
            Ok(FailOutcome::Failed { attempts }) => {
                let failure = JobError::PermanentHandlerFailure {
                    job_id: job_id.to_string(),
                    attempts,
                    reason: reason.clone(),
                };
                tracing::error!(
                    worker_id = %self.worker_id,
                    job_id = %job_id,
                    lane = %self.lane,
                    attempt = attempts,
                    error = %failure,
                    "Job failed permanently"
                );
                self.ctx
                    .audit
                    .record(
                        AuditAction::JobFailed,
                        ResourceType::Job,
                        Some(job_id),
                        None,
                        Some(json!({
                            "lane": self.lane.as_str(),
                            "attempts": attempts,
                            "error": reason,
                        })),
                    )
                    .await;
            }
            Err(JobError::LeaseLost(_)) => self.lease_lost(claim),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn lease_lost(&self, claim: &Claim) {
        tracing::warn!(
            worker_id = %self.worker_id,
            job_id = %claim.job_id(),
            lane = %self.lane,
            "Lease lost before acknowledgement, outcome discarded"
        );
    }

    /// Request shutdown of this worker
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// All workers of all lanes
pub struct WorkerPool {
    workers: Vec<tokio::task::JoinHandle<()>>,
    shutdown_txs: Vec<mpsc::Sender<()>>,
}

impl WorkerPool {
    /// Spawn `config.workers_for(lane)` workers for every lane
    ///
    /// Worker ids are `"{lane}-{n}"`.
    pub fn start(
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        ctx: Arc<JobContext>,
        config: &JobsConfig,
    ) -> Self {
        Self::start_lanes(store, registry, ctx, config, &Lane::ALL)
    }

    /// Spawn workers for the given lanes only
    pub fn start_lanes(
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        ctx: Arc<JobContext>,
        config: &JobsConfig,
        lanes: &[Lane],
    ) -> Self {
        let mut workers = Vec::new();
        let mut shutdown_txs = Vec::new();

        for &lane in lanes {
            for i in 0..config.workers_for(lane) {
                let worker_id = format!("{}-{}", lane, i);
                let (worker, shutdown_rx) = JobWorker::new(
                    store.clone(),
                    registry.clone(),
                    ctx.clone(),
                    lane,
                    worker_id,
                    config,
                );
                let shutdown_tx = worker.shutdown_tx.clone();

                let handle = tokio::spawn(async move {
                    worker.start(shutdown_rx).await;
                });

                workers.push(handle);
                shutdown_txs.push(shutdown_tx);
            }
        }

        tracing::info!(workers = workers.len(), "Worker pool started");

        Self { workers, shutdown_txs }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop all workers, letting each finish its in-flight job
    pub async fn shutdown(self) {
        tracing::info!("Shutting down worker pool...");

        for shutdown_tx in self.shutdown_txs {
            let _ = shutdown_tx.send(()).await;
        }

        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }

        tracing::info!("Worker pool shut down");
    }
}
