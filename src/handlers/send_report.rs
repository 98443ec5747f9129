use super::decode;
use crate::audit::{AuditAction, ResourceType};
use crate::context::JobContext;
use crate::error::{JobError, Result};
use crate::jobs::SendReportPayload;
use crate::traits::job::Job;
use crate::traits::mailer::{Attachment, Email};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

const SUBJECT: &str = "Feedback Report";
const BODY: &str = "Please find attached the latest feedback report.";

/// Email the report file to an admin
///
/// A report that cannot be read yet is retried like a transport error.
pub async fn handle(job: Job, ctx: Arc<JobContext>) -> Result<()> {
    let payload: SendReportPayload = decode(&job)?;

    let content = tokio::fs::read(&payload.report_path)
        .await
        .map_err(|e| JobError::transient(format!("Failed to read report {}: {}", payload.report_path, e)))?;
    let filename = Path::new(&payload.report_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("report");

    let email = Email::new(ctx.mail.from_address.clone(), payload.admin_email.clone(), SUBJECT)
        .text(BODY)
        .attach(Attachment::from_bytes(filename, content));
    ctx.mailer.send(&email).await?;

    tracing::info!(job_id = %job.id, admin_email = %payload.admin_email, "Report sent");
    ctx.audit
        .record(
            AuditAction::ReportSent,
            ResourceType::AdminAction,
            None,
            None,
            Some(json!({
                "adminEmail": payload.admin_email,
                "reportPath": payload.report_path,
            })),
        )
        .await;

    Ok(())
}
