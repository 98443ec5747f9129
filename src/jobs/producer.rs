//! Producer API used by request handlers to enqueue jobs
//!
//! Enqueueing validates the lane and the payload up front, records the job
//! in the store and returns straight away; the caller never waits for the
//! side effect.

use crate::error::{JobError, Result};
use crate::jobs::config::JobsConfig;
use crate::jobs::payload::{
    AnalyticsPayload, AnalyticsTask, LanePayload, NotifyAdminPayload, NotifyStudentPayload, SendEmailPayload,
    SendReportPayload,
};
use crate::jobs::Lane;
use crate::traits::job::{Backoff, Job, JobHandle, JobStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Per-job overrides of the configured retry policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Total attempt budget; must be at least 1
    pub attempts: Option<u32>,
    pub backoff: Option<Backoff>,
    /// Defer the first run
    pub delay: Option<Duration>,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Enqueues jobs into a [`JobStore`]
///
/// Cheap to clone and safe to share between request handlers.
#[derive(Clone)]
pub struct Producer {
    store: Arc<dyn JobStore>,
    default_attempts: u32,
    default_backoff: Backoff,
}

impl Producer {
    /// Create a producer with the stock policy (3 attempts, exponential 1s backoff)
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self::from_config(store, &JobsConfig::default())
    }

    /// Create a producer using the configured default retry policy
    pub fn from_config(store: Arc<dyn JobStore>, config: &JobsConfig) -> Self {
        Self {
            store,
            default_attempts: config.max_attempts.max(1),
            default_backoff: config.default_backoff(),
        }
    }

    /// Enqueue a job by lane name
    ///
    /// Fails with `InvalidLane` for an unknown lane, `Validation` when the
    /// payload or options are malformed, and `StoreUnavailable` when the job
    /// could not be recorded.
    pub async fn enqueue(&self, lane: &str, payload: Value, options: JobOptions) -> Result<JobHandle> {
        let lane: Lane = lane.parse()?;
        self.enqueue_lane(lane, payload, options).await
    }

    /// Enqueue a job on a known lane
    pub async fn enqueue_lane(&self, lane: Lane, payload: Value, options: JobOptions) -> Result<JobHandle> {
        let payload = LanePayload::parse(lane, &payload)?.to_value()?;

        let attempts = options.attempts.unwrap_or(self.default_attempts);
        if attempts == 0 {
            return Err(JobError::validation("attempts: must be at least 1"));
        }

        let mut job = Job::new(lane, payload, attempts, options.backoff.unwrap_or(self.default_backoff));
        if let Some(delay) = options.delay {
            job = job.delayed(delay);
        }

        let handle = self.store.push(job).await.map_err(|e| match e {
            JobError::StoreUnavailable(_) => e,
            other => JobError::store_unavailable(other.to_string()),
        })?;

        tracing::debug!(job_id = %handle.id, lane = %lane, attempts, "Job enqueued");
        Ok(handle)
    }

    /// Enqueue an already typed payload
    pub async fn enqueue_payload(&self, payload: impl Into<LanePayload>, options: JobOptions) -> Result<JobHandle> {
        let payload = payload.into();
        self.enqueue_lane(payload.lane(), payload.to_value()?, options).await
    }

    pub async fn send_email(
        &self,
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
        html: Option<String>,
    ) -> Result<JobHandle> {
        let payload = SendEmailPayload {
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            html,
        };
        self.enqueue_payload(payload, JobOptions::default()).await
    }

    /// Tell the admins about newly submitted feedback
    pub async fn notify_admin(
        &self,
        course: impl Into<String>,
        rating: i64,
        student: impl Into<String>,
    ) -> Result<JobHandle> {
        let payload = NotifyAdminPayload {
            course: course.into(),
            rating,
            student: student.into(),
        };
        self.enqueue_payload(payload, JobOptions::default()).await
    }

    pub async fn notify_student(
        &self,
        student_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<JobHandle> {
        let payload = NotifyStudentPayload {
            student_id: student_id.into(),
            message: message.into(),
        };
        self.enqueue_payload(payload, JobOptions::default()).await
    }

    pub async fn send_report(
        &self,
        admin_email: impl Into<String>,
        report_path: impl Into<String>,
    ) -> Result<JobHandle> {
        let payload = SendReportPayload {
            admin_email: admin_email.into(),
            report_path: report_path.into(),
        };
        self.enqueue_payload(payload, JobOptions::default()).await
    }

    pub async fn run_analytics(&self, task: AnalyticsTask) -> Result<JobHandle> {
        self.enqueue_payload(AnalyticsPayload { task }, JobOptions::default()).await
    }

    /// Current snapshot of an enqueued job
    pub async fn status(&self, handle: &JobHandle) -> Result<Job> {
        self.store
            .get(&handle.id)
            .await?
            .ok_or_else(|| JobError::not_found(format!("Job {}", handle.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryJobStore;
    use crate::traits::job::JobState;
    use serde_json::json;

    fn producer() -> (Producer, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        (Producer::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_enqueue_returns_pending_handle() {
        let (producer, _) = producer();
        let handle = producer
            .enqueue(
                "send-email",
                json!({"to": "a@b.com", "subject": "Verify", "text": "link"}),
                JobOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(handle.lane, Lane::SendEmail);
        let job = producer.status(&handle).await.unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.attempts_made, 0);
        assert_eq!(job.max_attempts, 3);
    }

    #[tokio::test]
    async fn test_unknown_lane_rejected() {
        let (producer, store) = producer();
        let err = producer
            .enqueue("send-fax", json!({}), JobOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidLane(_)));
        assert_eq!(store.stats(Lane::SendEmail).await.unwrap().pending, 0);
    }

    #[tokio::test]
    async fn test_invalid_payload_not_enqueued() {
        let (producer, store) = producer();
        let err = producer.notify_admin("Rust 101", 9, "s@uni.edu").await.unwrap_err();
        assert!(matches!(err, JobError::Validation(ref m) if m.contains("rating")));
        assert_eq!(store.stats(Lane::NotifyAdmin).await.unwrap().pending, 0);
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let (producer, _) = producer();
        let err = producer
            .enqueue(
                "analytics",
                json!({"task": "updateSentiment"}),
                JobOptions::new().attempts(0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(ref m) if m.contains("attempts")));
    }

    #[tokio::test]
    async fn test_options_override_defaults() {
        let (producer, _) = producer();
        let handle = producer
            .enqueue(
                "notify-student",
                json!({"studentId": "u1", "message": "hi"}),
                JobOptions::new()
                    .attempts(5)
                    .backoff(Backoff::fixed(Duration::from_secs(3)))
                    .delay(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        let job = producer.status(&handle).await.unwrap();
        assert_eq!(job.max_attempts, 5);
        assert_eq!(job.backoff, Backoff::fixed(Duration::from_secs(3)));
        assert!(job.run_at > job.enqueued_at);
    }

    #[tokio::test]
    async fn test_delayed_job_is_scheduled() {
        let (producer, store) = producer();
        producer
            .enqueue(
                "analytics",
                json!({"task": "updateCourseAvg"}),
                JobOptions::new().delay(Duration::from_secs(3600)),
            )
            .await
            .unwrap();

        let stats = store.stats(Lane::Analytics).await.unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.scheduled, 1);
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let (producer, store) = producer();
        producer.send_email("a@b.com", "Hi", "Body", None).await.unwrap();
        producer.notify_student("u1", "Graded").await.unwrap();
        producer.send_report("admin@uni.edu", "/tmp/report.csv").await.unwrap();
        producer.run_analytics(AnalyticsTask::UpdateSentiment).await.unwrap();

        for lane in [Lane::SendEmail, Lane::NotifyStudent, Lane::SendReport, Lane::Analytics] {
            assert_eq!(store.stats(lane).await.unwrap().pending, 1, "lane {}", lane);
        }
    }

    #[tokio::test]
    async fn test_status_of_unknown_handle() {
        let (producer, _) = producer();
        let handle = JobHandle {
            id: "missing".to_string(),
            lane: Lane::SendEmail,
        };
        assert!(matches!(producer.status(&handle).await, Err(JobError::NotFound(_))));
    }
}
