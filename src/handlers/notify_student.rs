use super::decode;
use crate::audit::{AuditAction, ResourceType};
use crate::context::JobContext;
use crate::error::Result;
use crate::jobs::NotifyStudentPayload;
use crate::traits::job::Job;
use serde_json::json;
use std::sync::Arc;

/// Push a notification to the student's live connections
///
/// Never fails: an offline student simply misses the push, and the audit
/// record is written either way.
pub async fn handle(job: Job, ctx: Arc<JobContext>) -> Result<()> {
    let payload: NotifyStudentPayload = decode(&job)?;

    let connections = match ctx.fanout.publish(&payload.student_id, &payload.message).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(job_id = %job.id, student_id = %payload.student_id, error = %e, "Notification publish failed");
            0
        }
    };
    if connections == 0 {
        tracing::debug!(job_id = %job.id, student_id = %payload.student_id, "Student offline, notification not delivered");
    }

    ctx.audit
        .record(
            AuditAction::StudentNotified,
            ResourceType::User,
            Some(&payload.student_id),
            None,
            Some(json!({ "message": payload.message })),
        )
        .await;

    Ok(())
}
