use super::decode;
use crate::context::JobContext;
use crate::error::Result;
use crate::jobs::SendEmailPayload;
use crate::traits::job::Job;
use crate::traits::mailer::Email;
use std::sync::Arc;

/// Send one message; transport errors are retried
pub async fn handle(job: Job, ctx: Arc<JobContext>) -> Result<()> {
    let payload: SendEmailPayload = decode(&job)?;

    let email = Email::new(ctx.mail.from_address.clone(), payload.to, payload.subject)
        .text(payload.text)
        .html_opt(payload.html);
    ctx.mailer.send(&email).await?;

    tracing::debug!(job_id = %job.id, lane = %job.lane, "Email delivered");
    Ok(())
}
