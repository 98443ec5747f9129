//! Audit storage trait and in-memory implementation

use super::record::{AuditEntry, AuditRecord};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

/// Trait for audit record storage
///
/// Stores are append-only: records are never updated or deleted.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct MongoAuditStore { collection: Collection<AuditRecord> }
///
/// #[async_trait]
/// impl AuditStore for MongoAuditStore {
///     async fn append(&self, entry: AuditEntry) -> Result<AuditRecord> {
///         // insert_one
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Write one record
    async fn append(&self, entry: AuditEntry) -> Result<AuditRecord>;

    /// All records about one resource, oldest first
    async fn by_resource(&self, resource_id: &str) -> Result<Vec<AuditRecord>>;

    /// Records by one actor, newest first
    async fn by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<AuditRecord>>;

    /// The most recent records, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>>;
}

/// In-memory audit store
///
/// Records are kept in write order; a sequence number breaks ties between
/// records written within the same timestamp tick.
#[derive(Default)]
pub struct InMemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<AuditRecord> {
        let mut records = self.records.write().await;
        let seq = records.len() as u64 + 1;
        // Clock steps backwards must not reorder the log
        let created_at = records
            .last()
            .map(|last| last.created_at.max(Utc::now()))
            .unwrap_or_else(Utc::now);
        let record = AuditRecord::from_entry(entry, seq, created_at);
        records.push(record.clone());
        Ok(record)
    }

    async fn by_resource(&self, resource_id: &str) -> Result<Vec<AuditRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.resource_id.as_deref() == Some(resource_id))
            .cloned()
            .collect())
    }

    async fn by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<AuditRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.actor_id.as_deref() == Some(actor_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, ResourceType};

    fn entry(action: AuditAction, resource: &str) -> AuditEntry {
        AuditEntry::new(action, ResourceType::User).resource(resource)
    }

    #[tokio::test]
    async fn test_by_resource_returns_only_that_resource_in_order() {
        let store = InMemoryAuditStore::new();
        store.append(entry(AuditAction::StudentNotified, "u1")).await.unwrap();
        store.append(entry(AuditAction::StudentNotified, "u2")).await.unwrap();
        store.append(entry(AuditAction::ProfileUpdated, "u1")).await.unwrap();

        let records = store.by_resource("u1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, AuditAction::StudentNotified);
        assert_eq!(records[1].action, AuditAction::ProfileUpdated);
        assert!(records[0].seq < records[1].seq);
        assert!(records[0].created_at <= records[1].created_at);
    }

    #[tokio::test]
    async fn test_by_actor_newest_first() {
        let store = InMemoryAuditStore::new();
        for i in 0..5 {
            store
                .append(entry(AuditAction::CourseEdited, &format!("c{}", i)).actor("admin-1"))
                .await
                .unwrap();
        }
        store.append(entry(AuditAction::CourseEdited, "c9")).await.unwrap();

        let records = store.by_actor("admin-1", 3).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].resource_id.as_deref(), Some("c4"));
    }

    #[tokio::test]
    async fn test_recent() {
        let store = InMemoryAuditStore::new();
        assert!(store.recent(10).await.unwrap().is_empty());

        store.append(entry(AuditAction::UserBlocked, "u1")).await.unwrap();
        store.append(entry(AuditAction::UserUnblocked, "u1")).await.unwrap();

        let records = store.recent(1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::UserUnblocked);
        assert_eq!(store.len().await, 2);
    }
}
