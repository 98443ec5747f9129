//! Component health of the job system
//!
//! Exposes the store, mailer and real-time channel as health checks, and an
//! axum route that serves the combined result.

use crate::jobs::Lane;
use crate::realtime::ConnectionManager;
use crate::traits::job::JobStore;
use crate::traits::mailer::Mailer;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health check status
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result for a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    fn new(name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: Some(message.into()),
        }
    }
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: Vec<ComponentHealth>,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

/// Trait for implementing health checks
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self) -> BoxFuture<'_, ComponentHealth>;
}

/// Reports the job store as unhealthy when it is unreachable
pub struct JobStoreHealthCheck {
    store: Arc<dyn JobStore>,
}

impl JobStoreHealthCheck {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

impl HealthCheck for JobStoreHealthCheck {
    fn name(&self) -> &str {
        "job_store"
    }

    fn check(&self) -> BoxFuture<'_, ComponentHealth> {
        Box::pin(async move {
            if !self.store.ping().await {
                return ComponentHealth::new(self.name(), HealthStatus::Unhealthy, "Store unreachable");
            }
            let mut active = 0;
            for lane in Lane::ALL {
                match self.store.stats(lane).await {
                    Ok(stats) => active += stats.active,
                    Err(e) => {
                        return ComponentHealth::new(self.name(), HealthStatus::Unhealthy, e.to_string());
                    }
                }
            }
            ComponentHealth::new(self.name(), HealthStatus::Healthy, format!("{} active job(s)", active))
        })
    }
}

/// Degraded when the mail transport reports unhealthy
pub struct MailerHealthCheck {
    mailer: Arc<dyn Mailer>,
}

impl MailerHealthCheck {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

impl HealthCheck for MailerHealthCheck {
    fn name(&self) -> &str {
        "mailer"
    }

    fn check(&self) -> BoxFuture<'_, ComponentHealth> {
        Box::pin(async move {
            if self.mailer.is_healthy() {
                ComponentHealth::new(self.name(), HealthStatus::Healthy, "Mail transport ready")
            } else {
                ComponentHealth::new(self.name(), HealthStatus::Degraded, "Mail transport unavailable")
            }
        })
    }
}

/// Degraded when the connection limit is reached
pub struct RealtimeHealthCheck {
    manager: Arc<ConnectionManager>,
}

impl RealtimeHealthCheck {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

impl HealthCheck for RealtimeHealthCheck {
    fn name(&self) -> &str {
        "realtime"
    }

    fn check(&self) -> BoxFuture<'_, ComponentHealth> {
        Box::pin(async move {
            let metrics = self.manager.metrics();
            let message = format!(
                "{} connection(s), {} user(s)",
                metrics.active_connections, metrics.bound_users
            );
            let full = metrics.max_connections > 0 && metrics.active_connections >= metrics.max_connections;
            let status = if full { HealthStatus::Degraded } else { HealthStatus::Healthy };
            ComponentHealth::new(self.name(), status, message)
        })
    }
}

/// Runs all registered checks
#[derive(Clone, Default)]
pub struct HealthChecker {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub async fn check_health(&self) -> HealthResponse {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        for check in &self.checks {
            let result = check.check().await;

            match result.status {
                HealthStatus::Unhealthy => overall_status = HealthStatus::Unhealthy,
                HealthStatus::Degraded if overall_status == HealthStatus::Healthy => {
                    overall_status = HealthStatus::Degraded
                }
                _ => {}
            }

            checks.push(result);
        }

        HealthResponse {
            status: overall_status,
            checks,
        }
    }
}

async fn health_handler(State(checker): State<Arc<HealthChecker>>) -> HealthResponse {
    checker.check_health().await
}

/// Router serving `GET /health`
pub fn health_routes<S>(checker: HealthChecker) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .with_state(Arc::new(checker))
}
