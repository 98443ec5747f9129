//! Shared collaborators handed to every job handler

use crate::analytics::AnalyticsRunner;
use crate::audit::{AuditSink, AuditStore, InMemoryAuditStore};
use crate::email::MailConfig;
use crate::error::{JobError, Result};
use crate::realtime::{ConnectionManager, NotificationFanout};
use crate::traits::mailer::Mailer;
use std::sync::Arc;

/// Everything a handler may touch while running a job
///
/// Constructed once by the embedding service and shared by all workers.
#[derive(Clone)]
pub struct JobContext {
    pub mailer: Arc<dyn Mailer>,
    pub fanout: Arc<dyn NotificationFanout>,
    pub audit: AuditSink,
    analytics: Option<Arc<dyn AnalyticsRunner>>,
    pub mail: MailConfig,
}

impl JobContext {
    pub fn builder() -> JobContextBuilder {
        JobContextBuilder::new()
    }

    /// Get the analytics runner, returning an error if not configured
    pub fn analytics(&self) -> Result<&Arc<dyn AnalyticsRunner>> {
        self.analytics
            .as_ref()
            .ok_or_else(|| JobError::internal("Analytics runner not configured"))
    }

    /// Get the analytics runner as an Option
    pub fn analytics_opt(&self) -> Option<&Arc<dyn AnalyticsRunner>> {
        self.analytics.as_ref()
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("audit_enabled", &self.audit.is_enabled())
            .field("analytics", &self.analytics.is_some())
            .field("admin_recipients", &self.mail.admin_recipients.len())
            .finish()
    }
}

/// Builder for [`JobContext`]
///
/// Anything left unset falls back to a development default: the mailer
/// configured by [`MailConfig`], a fresh [`ConnectionManager`] with no
/// clients and an in-process audit store.
#[derive(Default)]
pub struct JobContextBuilder {
    mailer: Option<Arc<dyn Mailer>>,
    fanout: Option<Arc<dyn NotificationFanout>>,
    audit: Option<AuditSink>,
    analytics: Option<Arc<dyn AnalyticsRunner>>,
    mail: Option<MailConfig>,
}

impl JobContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_fanout(mut self, fanout: Arc<dyn NotificationFanout>) -> Self {
        self.fanout = Some(fanout);
        self
    }

    pub fn with_audit(mut self, sink: AuditSink) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Write audit records to the given store
    pub fn with_audit_store(self, store: Arc<dyn AuditStore>) -> Self {
        self.with_audit(AuditSink::new(store))
    }

    pub fn with_analytics(mut self, runner: Arc<dyn AnalyticsRunner>) -> Self {
        self.analytics = Some(runner);
        self
    }

    pub fn with_mail_config(mut self, config: MailConfig) -> Self {
        self.mail = Some(config);
        self
    }

    pub fn build(self) -> Result<JobContext> {
        let mail = self.mail.unwrap_or_default();
        let mailer = match self.mailer {
            Some(mailer) => mailer,
            None => mail.build_mailer()?,
        };
        let fanout = self
            .fanout
            .unwrap_or_else(|| Arc::new(ConnectionManager::new()) as Arc<dyn NotificationFanout>);

        Ok(JobContext {
            mailer,
            fanout,
            audit: self
                .audit
                .unwrap_or_else(|| AuditSink::new(Arc::new(InMemoryAuditStore::new()))),
            analytics: self.analytics,
            mail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, ResourceType};

    #[test]
    fn test_defaults() {
        let ctx = JobContext::builder().build().unwrap();
        assert!(ctx.audit.is_enabled());
        assert!(ctx.analytics_opt().is_none());
        assert!(matches!(ctx.analytics(), Err(JobError::Internal(_))));
        assert_eq!(ctx.mail.admin_recipients.len(), 2);
    }

    #[test]
    fn test_audit_store_enables_sink() {
        let ctx = JobContext::builder()
            .with_audit_store(Arc::new(InMemoryAuditStore::new()))
            .build()
            .unwrap();
        assert!(ctx.audit.is_enabled());
    }

    #[tokio::test]
    async fn test_default_context_keeps_audit_records() {
        let ctx = JobContext::builder().build().unwrap();
        ctx.audit
            .record(AuditAction::StudentNotified, ResourceType::User, Some("u1"), None, None)
            .await;

        let records = ctx.audit.by_resource("u1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::StudentNotified);
    }

    #[test]
    fn test_audit_can_be_switched_off() {
        let ctx = JobContext::builder().with_audit(AuditSink::disabled()).build().unwrap();
        assert!(!ctx.audit.is_enabled());
    }
}
