//! Lane payload schemas
//!
//! Each lane accepts exactly one payload shape. Payloads travel through the
//! store as JSON objects using the wire field names of the web service
//! (`studentId`, `adminEmail`, ...), and are validated with `validator`
//! before they are ever enqueued.

use crate::error::{JobError, Result};
use crate::jobs::lane::Lane;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

/// `send-email`: a single outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SendEmailPayload {
    #[validate(email(message = "must be a valid email address"))]
    pub to: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub subject: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// `notify-admin`: new feedback was submitted for a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NotifyAdminPayload {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub course: String,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: i64,
    #[validate(email(message = "must be a valid email address"))]
    pub student: String,
}

/// `notify-student`: push a message to a student's live sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotifyStudentPayload {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub student_id: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub message: String,
}

/// `send-report`: email a report file to an admin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendReportPayload {
    #[validate(email(message = "must be a valid email address"))]
    pub admin_email: String,
    #[validate(custom(function = "validate_report_path"))]
    pub report_path: String,
}

/// Batch computations the analytics lane knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalyticsTask {
    /// Reclassify the sentiment of feedback still marked neutral
    UpdateSentiment,
    /// Recompute per-course average ratings
    UpdateCourseAvg,
}

impl AnalyticsTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsTask::UpdateSentiment => "updateSentiment",
            AnalyticsTask::UpdateCourseAvg => "updateCourseAvg",
        }
    }
}

impl std::fmt::Display for AnalyticsTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `analytics`: run one named batch computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AnalyticsPayload {
    pub task: AnalyticsTask,
}

fn validate_report_path(path: &str) -> std::result::Result<(), ValidationError> {
    if path.trim().is_empty() {
        let mut err = ValidationError::new("report_path");
        err.message = Some(std::borrow::Cow::Borrowed("must not be empty"));
        return Err(err);
    }
    Ok(())
}

/// A payload that has been checked against its lane's schema
#[derive(Debug, Clone, PartialEq)]
pub enum LanePayload {
    SendEmail(SendEmailPayload),
    NotifyAdmin(NotifyAdminPayload),
    Analytics(AnalyticsPayload),
    SendReport(SendReportPayload),
    NotifyStudent(NotifyStudentPayload),
}

impl LanePayload {
    /// Parse and validate a raw JSON payload for `lane`
    pub fn parse(lane: Lane, value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(JobError::validation(format!(
                "payload for lane '{}' must be a JSON object",
                lane
            )));
        }

        let payload = match lane {
            Lane::SendEmail => LanePayload::SendEmail(decode(lane, value)?),
            Lane::NotifyAdmin => LanePayload::NotifyAdmin(decode(lane, value)?),
            Lane::Analytics => LanePayload::Analytics(decode(lane, value)?),
            Lane::SendReport => LanePayload::SendReport(decode(lane, value)?),
            Lane::NotifyStudent => LanePayload::NotifyStudent(decode(lane, value)?),
        };
        payload.validate()?;
        Ok(payload)
    }

    /// The lane this payload belongs to
    pub fn lane(&self) -> Lane {
        match self {
            LanePayload::SendEmail(_) => Lane::SendEmail,
            LanePayload::NotifyAdmin(_) => Lane::NotifyAdmin,
            LanePayload::Analytics(_) => Lane::Analytics,
            LanePayload::SendReport(_) => Lane::SendReport,
            LanePayload::NotifyStudent(_) => Lane::NotifyStudent,
        }
    }

    /// Serialize back to the JSON stored with the job
    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            LanePayload::SendEmail(p) => serde_json::to_value(p),
            LanePayload::NotifyAdmin(p) => serde_json::to_value(p),
            LanePayload::Analytics(p) => serde_json::to_value(p),
            LanePayload::SendReport(p) => serde_json::to_value(p),
            LanePayload::NotifyStudent(p) => serde_json::to_value(p),
        };
        value.map_err(|e| JobError::internal(format!("Failed to serialize payload: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        match self {
            LanePayload::SendEmail(p) => p.validate()?,
            LanePayload::NotifyAdmin(p) => p.validate()?,
            LanePayload::Analytics(p) => p.validate()?,
            LanePayload::SendReport(p) => p.validate()?,
            LanePayload::NotifyStudent(p) => p.validate()?,
        }
        Ok(())
    }
}

impl From<SendEmailPayload> for LanePayload {
    fn from(p: SendEmailPayload) -> Self {
        LanePayload::SendEmail(p)
    }
}

impl From<NotifyAdminPayload> for LanePayload {
    fn from(p: NotifyAdminPayload) -> Self {
        LanePayload::NotifyAdmin(p)
    }
}

impl From<AnalyticsPayload> for LanePayload {
    fn from(p: AnalyticsPayload) -> Self {
        LanePayload::Analytics(p)
    }
}

impl From<SendReportPayload> for LanePayload {
    fn from(p: SendReportPayload) -> Self {
        LanePayload::SendReport(p)
    }
}

impl From<NotifyStudentPayload> for LanePayload {
    fn from(p: NotifyStudentPayload) -> Self {
        LanePayload::NotifyStudent(p)
    }
}

fn decode<T: serde::de::DeserializeOwned>(lane: Lane, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| JobError::validation(format!("payload for lane '{}': {}", lane, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_send_email_payload() {
        let payload = LanePayload::parse(
            Lane::SendEmail,
            &json!({"to": "a@b.com", "subject": "Verify", "text": "link"}),
        )
        .unwrap();

        match payload {
            LanePayload::SendEmail(p) => {
                assert_eq!(p.to, "a@b.com");
                assert_eq!(p.subject, "Verify");
                assert_eq!(p.text, "link");
                assert!(p.html.is_none());
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_send_email_rejects_bad_address() {
        let err = LanePayload::parse(
            Lane::SendEmail,
            &json!({"to": "not-an-email", "subject": "Verify", "text": "link"}),
        )
        .unwrap_err();
        assert!(matches!(err, JobError::Validation(ref m) if m.contains("to")));
    }

    #[test]
    fn test_send_email_requires_subject_field() {
        let err = LanePayload::parse(Lane::SendEmail, &json!({"to": "a@b.com", "text": "x"}))
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(ref m) if m.contains("subject")));
    }

    #[test]
    fn test_notify_admin_rating_range() {
        for rating in [0, 6, -1] {
            let err = LanePayload::parse(
                Lane::NotifyAdmin,
                &json!({"course": "Rust 101", "rating": rating, "student": "s@uni.edu"}),
            )
            .unwrap_err();
            assert!(matches!(err, JobError::Validation(ref m) if m.contains("rating")));
        }

        for rating in 1..=5 {
            assert!(LanePayload::parse(
                Lane::NotifyAdmin,
                &json!({"course": "Rust 101", "rating": rating, "student": "s@uni.edu"}),
            )
            .is_ok());
        }
    }

    #[test]
    fn test_notify_admin_rejects_fractional_rating() {
        let err = LanePayload::parse(
            Lane::NotifyAdmin,
            &json!({"course": "Rust 101", "rating": 4.5, "student": "s@uni.edu"}),
        )
        .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }

    #[test]
    fn test_notify_student_uses_camel_case() {
        let payload = LanePayload::parse(
            Lane::NotifyStudent,
            &json!({"studentId": "u1", "message": "Graded"}),
        )
        .unwrap();
        assert_eq!(
            payload.to_value().unwrap(),
            json!({"studentId": "u1", "message": "Graded"})
        );
    }

    #[test]
    fn test_send_report_requires_path() {
        let err = LanePayload::parse(
            Lane::SendReport,
            &json!({"adminEmail": "admin@uni.edu", "reportPath": "   "}),
        )
        .unwrap_err();
        assert!(matches!(err, JobError::Validation(ref m) if m.contains("report_path")));
    }

    #[test]
    fn test_analytics_task_names() {
        let payload =
            LanePayload::parse(Lane::Analytics, &json!({"task": "updateCourseAvg"})).unwrap();
        assert_eq!(
            payload,
            LanePayload::Analytics(AnalyticsPayload {
                task: AnalyticsTask::UpdateCourseAvg
            })
        );

        let err = LanePayload::parse(Lane::Analytics, &json!({"task": "mineBitcoin"})).unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }

    #[test]
    fn test_payload_must_be_object() {
        let err = LanePayload::parse(Lane::Analytics, &json!(["updateSentiment"])).unwrap_err();
        assert!(matches!(err, JobError::Validation(ref m) if m.contains("JSON object")));
    }

    #[test]
    fn test_payload_for_wrong_lane() {
        // A notify-student payload is not a valid send-email payload
        let err = LanePayload::parse(
            Lane::SendEmail,
            &json!({"studentId": "u1", "message": "Graded"}),
        )
        .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }
}
