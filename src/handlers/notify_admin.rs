//! Notify every configured admin about new feedback
//!
//! Each successful delivery is recorded as an `ADMIN_NOTIFIED` audit record
//! keyed by the job id. A retry reads those records back and only mails the
//! admins that are still missing. Without an audit store every retry mails
//! all admins again.

use super::decode;
use crate::audit::{AuditAction, ResourceType};
use crate::context::JobContext;
use crate::error::{JobError, Result};
use crate::jobs::NotifyAdminPayload;
use crate::traits::job::Job;
use crate::traits::mailer::Email;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

const SUBJECT: &str = "New Feedback Submitted";

pub async fn handle(job: Job, ctx: Arc<JobContext>) -> Result<()> {
    let payload: NotifyAdminPayload = decode(&job)?;

    if ctx.mail.admin_recipients.is_empty() {
        tracing::warn!(job_id = %job.id, "No admin recipients configured, skipping");
        return Ok(());
    }

    let delivered = already_notified(&ctx, &job.id).await;
    let text = format!(
        "{} submitted feedback for {} with rating {}",
        payload.student, payload.course, payload.rating
    );

    let mut failures = Vec::new();
    for recipient in &ctx.mail.admin_recipients {
        if delivered.contains(recipient) {
            tracing::debug!(job_id = %job.id, recipient = %recipient, "Admin already notified");
            continue;
        }

        let email = Email::new(ctx.mail.from_address.clone(), recipient.clone(), SUBJECT).text(text.clone());
        match ctx.mailer.send(&email).await {
            Ok(()) => {
                tracing::debug!(job_id = %job.id, recipient = %recipient, "Admin notified");
                ctx.audit
                    .record(
                        AuditAction::AdminNotified,
                        ResourceType::Job,
                        Some(&job.id),
                        None,
                        Some(json!({
                            "recipient": recipient,
                            "course": payload.course,
                            "rating": payload.rating,
                        })),
                    )
                    .await;
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, recipient = %recipient, error = %e, "Admin notification failed");
                failures.push((recipient.as_str(), e));
            }
        }
    }

    if failures.is_empty() {
        return Ok(());
    }

    let summary = failures
        .iter()
        .map(|(recipient, e)| format!("{}: {}", recipient, e))
        .collect::<Vec<_>>()
        .join("; ");
    if failures.iter().any(|(_, e)| e.is_retryable()) {
        Err(JobError::transient(format!(
            "{} of {} admin notification(s) failed: {}",
            failures.len(),
            ctx.mail.admin_recipients.len(),
            summary
        )))
    } else {
        Err(JobError::validation(summary))
    }
}

/// Recipients this job already reached on an earlier attempt
async fn already_notified(ctx: &JobContext, job_id: &str) -> HashSet<String> {
    let records = match ctx.audit.by_resource(job_id).await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Could not read earlier deliveries");
            return HashSet::new();
        }
    };

    records
        .into_iter()
        .filter(|r| r.action == AuditAction::AdminNotified)
        .filter_map(|r| r.details.get("recipient").and_then(|v| v.as_str()).map(String::from))
        .collect()
}
