//! Lane handlers
//!
//! One async function per lane. Each decodes and re-validates its payload,
//! performs the side effect through the [`JobContext`] collaborators and
//! returns an error only when the attempt should count as failed.

mod analytics;
mod notify_admin;
mod notify_student;
mod send_email;
mod send_report;


use crate::error::{JobError, Result};
use crate::jobs::{HandlerRegistry, Lane};
use crate::traits::job::Job;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use validator::Validate;

pub use analytics::handle as analytics;
pub use notify_admin::handle as notify_admin;
pub use notify_student::handle as notify_student;
pub use send_email::handle as send_email;
pub use send_report::handle as send_report;

/// Register the bundled handler of every lane
pub async fn register_all(registry: &HandlerRegistry) {
    registry.register(Lane::SendEmail, |job, ctx| send_email(job, ctx).boxed()).await;
    registry.register(Lane::NotifyAdmin, |job, ctx| notify_admin(job, ctx).boxed()).await;
    registry.register(Lane::Analytics, |job, ctx| analytics(job, ctx).boxed()).await;
    registry.register(Lane::SendReport, |job, ctx| send_report(job, ctx).boxed()).await;
    registry.register(Lane::NotifyStudent, |job, ctx| notify_student(job, ctx).boxed()).await;
}

/// Decode a stored payload, checking it again against the lane schema
fn decode<T>(job: &Job) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let payload: T = serde_json::from_value(job.payload.clone())
        .map_err(|e| JobError::validation(format!("{} payload: {}", job.lane, e)))?;
    payload.validate()?;
    Ok(payload)
}
