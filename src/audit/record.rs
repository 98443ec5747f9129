//! Audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    // Recorded by the web service
    FeedbackSubmitted,
    FeedbackEdited,
    FeedbackDeleted,
    ProfileUpdated,
    PasswordChanged,
    UserBlocked,
    UserUnblocked,
    CourseAdded,
    CourseEdited,
    CourseDeleted,

    // Recorded by job handlers
    ReportSent,
    StudentNotified,
    AdminNotified,
    AnalyticsCompleted,
    JobFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeedbackSubmitted => "FEEDBACK_SUBMITTED",
            Self::FeedbackEdited => "FEEDBACK_EDITED",
            Self::FeedbackDeleted => "FEEDBACK_DELETED",
            Self::ProfileUpdated => "PROFILE_UPDATED",
            Self::PasswordChanged => "PASSWORD_CHANGED",
            Self::UserBlocked => "USER_BLOCKED",
            Self::UserUnblocked => "USER_UNBLOCKED",
            Self::CourseAdded => "COURSE_ADDED",
            Self::CourseEdited => "COURSE_EDITED",
            Self::CourseDeleted => "COURSE_DELETED",
            Self::ReportSent => "REPORT_SENT",
            Self::StudentNotified => "STUDENT_NOTIFIED",
            Self::AdminNotified => "ADMIN_NOTIFIED",
            Self::AnalyticsCompleted => "ANALYTICS_COMPLETED",
            Self::JobFailed => "JOB_FAILED",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of entity a record is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Feedback,
    User,
    Profile,
    Course,
    AdminAction,
    Job,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Feedback => "FEEDBACK",
            Self::User => "USER",
            Self::Profile => "PROFILE",
            Self::Course => "COURSE",
            Self::AdminAction => "ADMIN_ACTION",
            Self::Job => "JOB",
        };
        f.write_str(s)
    }
}

/// An audit record about to be written
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
    /// `None` means the system itself
    pub actor_id: Option<String>,
    pub details: Value,
}

impl AuditEntry {
    #[must_use]
    pub fn new(action: AuditAction, resource_type: ResourceType) -> Self {
        Self {
            action,
            resource_type,
            resource_id: None,
            actor_id: None,
            details: Value::Object(Default::default()),
        }
    }

    #[must_use]
    pub fn resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    #[must_use]
    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Attach details; non-object values are wrapped as `{"value": ...}`
    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = match details {
            Value::Object(_) => details,
            Value::Null => Value::Object(Default::default()),
            other => serde_json::json!({ "value": other }),
        };
        self
    }
}

/// A written audit record. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    /// Position in the store; breaks ties between equal timestamps
    pub seq: u64,
    pub actor_id: Option<String>,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub(crate) fn from_entry(entry: AuditEntry, seq: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            seq,
            actor_id: entry.actor_id,
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            details: entry.details,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_builder() {
        let entry = AuditEntry::new(AuditAction::StudentNotified, ResourceType::User)
            .resource("u1")
            .details(json!({"message": "hi"}));

        assert_eq!(entry.resource_id.as_deref(), Some("u1"));
        assert!(entry.actor_id.is_none());
        assert_eq!(entry.details["message"], json!("hi"));
    }

    #[test]
    fn test_details_always_object() {
        let entry = AuditEntry::new(AuditAction::JobFailed, ResourceType::Job).details(json!("boom"));
        assert_eq!(entry.details, json!({"value": "boom"}));

        let entry = AuditEntry::new(AuditAction::JobFailed, ResourceType::Job).details(Value::Null);
        assert_eq!(entry.details, json!({}));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_value(AuditAction::ReportSent).unwrap(), json!("REPORT_SENT"));
        assert_eq!(serde_json::to_value(ResourceType::AdminAction).unwrap(), json!("ADMIN_ACTION"));
        assert_eq!(AuditAction::AnalyticsCompleted.to_string(), "ANALYTICS_COMPLETED");
        assert_eq!(ResourceType::Job.to_string(), "JOB");
    }

    #[test]
    fn test_record_serialization() {
        let entry = AuditEntry::new(AuditAction::ReportSent, ResourceType::AdminAction).actor("admin-1");
        let record = AuditRecord::from_entry(entry, 7, Utc::now());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["resourceType"], json!("ADMIN_ACTION"));
        assert_eq!(value["actorId"], json!("admin-1"));
        assert_eq!(value["seq"], json!(7));
    }
}
