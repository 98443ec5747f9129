use super::decode;
use crate::audit::{AuditAction, ResourceType};
use crate::context::JobContext;
use crate::error::Result;
use crate::jobs::AnalyticsPayload;
use crate::traits::job::Job;
use std::sync::Arc;

/// Run the named batch computation
///
/// Without a configured runner the job is skipped, not failed.
pub async fn handle(job: Job, ctx: Arc<JobContext>) -> Result<()> {
    let payload: AnalyticsPayload = decode(&job)?;

    let Some(runner) = ctx.analytics_opt() else {
        tracing::warn!(job_id = %job.id, task = %payload.task, "Analytics runner not configured, skipping");
        return Ok(());
    };

    let summary = runner.run(payload.task).await?;
    tracing::info!(
        job_id = %job.id,
        task = %payload.task,
        examined = summary.examined,
        updated = summary.updated,
        skipped = summary.skipped,
        "Analytics task completed"
    );

    ctx.audit
        .record(
            AuditAction::AnalyticsCompleted,
            ResourceType::Job,
            Some(&job.id),
            None,
            serde_json::to_value(&summary).ok(),
        )
        .await;

    Ok(())
}
