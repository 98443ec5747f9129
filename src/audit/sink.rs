//! Best-effort audit sink used by job handlers

use super::record::{AuditAction, AuditEntry, AuditRecord, ResourceType};
use super::store::AuditStore;
use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;

/// Fire-and-forget front for an [`AuditStore`]
///
/// Writing never fails the calling operation: store errors are logged at
/// warn level and swallowed. A disabled sink drops every record.
#[derive(Clone, Default)]
pub struct AuditSink {
    store: Option<Arc<dyn AuditStore>>,
}

impl AuditSink {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A sink that records nothing
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Append one record
    ///
    /// Returns the written record, or `None` if it was dropped.
    pub async fn record(
        &self,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        actor_id: Option<&str>,
        details: Option<Value>,
    ) -> Option<AuditRecord> {
        let mut entry = AuditEntry::new(action, resource_type);
        if let Some(id) = resource_id {
            entry = entry.resource(id);
        }
        if let Some(id) = actor_id {
            entry = entry.actor(id);
        }
        if let Some(details) = details {
            entry = entry.details(details);
        }
        self.record_entry(entry).await
    }

    /// Append a prepared entry
    pub async fn record_entry(&self, entry: AuditEntry) -> Option<AuditRecord> {
        let store = self.store.as_ref()?;
        let action = entry.action;
        let resource_id = entry.resource_id.clone();

        match store.append(entry).await {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    action = %action,
                    resource_id = ?resource_id,
                    "Failed to record audit entry"
                );
                None
            }
        }
    }

    /// All records about one resource, oldest first
    pub async fn by_resource(&self, resource_id: &str) -> Result<Vec<AuditRecord>> {
        match &self.store {
            Some(store) => store.by_resource(resource_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Records by one actor, newest first
    pub async fn by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<AuditRecord>> {
        match &self.store {
            Some(store) => store.by_actor(actor_id, limit).await,
            None => Ok(Vec::new()),
        }
    }

    /// The most recent records, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        match &self.store {
            Some(store) => store.recent(limit).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditStore;
    use crate::error::JobError;
    use async_trait::async_trait;
    use serde_json::json;

    struct BrokenStore;

    #[async_trait]
    impl AuditStore for BrokenStore {
        async fn append(&self, _entry: AuditEntry) -> Result<AuditRecord> {
            Err(JobError::store_unavailable("audit db down"))
        }
        async fn by_resource(&self, _resource_id: &str) -> Result<Vec<AuditRecord>> {
            Err(JobError::store_unavailable("audit db down"))
        }
        async fn by_actor(&self, _actor_id: &str, _limit: usize) -> Result<Vec<AuditRecord>> {
            Err(JobError::store_unavailable("audit db down"))
        }
        async fn recent(&self, _limit: usize) -> Result<Vec<AuditRecord>> {
            Err(JobError::store_unavailable("audit db down"))
        }
    }

    #[tokio::test]
    async fn test_record_writes_to_store() {
        let store = Arc::new(InMemoryAuditStore::new());
        let sink = AuditSink::new(store.clone());

        let record = sink
            .record(
                AuditAction::StudentNotified,
                ResourceType::User,
                Some("u1"),
                None,
                Some(json!({"message": "hi"})),
            )
            .await
            .unwrap();

        assert_eq!(record.resource_id.as_deref(), Some("u1"));
        assert!(record.actor_id.is_none());
        assert_eq!(sink.by_resource("u1").await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_store_errors_are_swallowed() {
        let sink = AuditSink::new(Arc::new(BrokenStore));
        let record = sink
            .record(AuditAction::ReportSent, ResourceType::AdminAction, None, None, None)
            .await;
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_disabled_sink() {
        let sink = AuditSink::disabled();
        assert!(!sink.is_enabled());
        assert!(sink
            .record(AuditAction::JobFailed, ResourceType::Job, Some("j1"), None, None)
            .await
            .is_none());
        assert!(sink.recent(10).await.unwrap().is_empty());
    }
}
