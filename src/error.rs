use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::time::Duration;

/// The error type shared by the producer, the job stores and the workers
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Unknown lane name. A caller bug, never retried.
    #[error("Invalid lane: {0}")]
    InvalidLane(String),

    /// Payload or options failed the lane schema. A caller bug, never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// I/O failure inside a handler, retried per the backoff policy.
    #[error("Handler failed: {0}")]
    TransientHandler(String),

    /// Attempts exhausted; surfaced to operators through logs and audit.
    #[error("Job {job_id} failed permanently after {attempts} attempt(s): {reason}")]
    PermanentHandlerFailure {
        job_id: String,
        attempts: u32,
        reason: String,
    },

    /// The job store could not be reached.
    #[error("Job store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The worker no longer holds the claim it is trying to acknowledge.
    #[error("Lease lost for job {0}")]
    LeaseLost(String),

    /// The real-time channel refused a new connection.
    #[error("Maximum connection limit ({0}) reached")]
    ConnectionLimit(usize),

    #[error("Handler timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    error_id: String,
}

impl JobError {
    pub fn invalid_lane(lane: impl Into<String>) -> Self {
        Self::InvalidLane(lane.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientHandler(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn lease_lost(job_id: impl Into<String>) -> Self {
        Self::LeaseLost(job_id.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a handler failing with this error should consume another attempt.
    ///
    /// Caller bugs (bad lane, bad payload) can never succeed on a re-run, so the
    /// worker fails those jobs permanently on the first attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidLane(_) | Self::Validation(_) | Self::PermanentHandlerFailure { .. }
        )
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidLane(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreUnavailable(_) | Self::ConnectionLimit(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::LeaseLost(_) => StatusCode::CONFLICT,
            Self::TransientHandler(_)
            | Self::PermanentHandlerFailure { .. }
            | Self::Internal(_)
            | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to an HTTP client.
    ///
    /// Caller errors are echoed back; server-side details stay in the logs.
    fn safe_message(&self) -> String {
        match self {
            Self::InvalidLane(_) | Self::Validation(_) | Self::NotFound(_) => self.to_string(),
            Self::StoreUnavailable(_) | Self::ConnectionLimit(_) => "Service unavailable".to_string(),
            Self::Timeout(_) => "Timed out".to_string(),
            Self::LeaseLost(_) => "Conflict".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            status = status.as_u16(),
            error_id = %error_id,
            error = %self,
            "Request failed"
        );

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });
        (status, body).into_response()
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            JobError::Validation(format!("JSON error: {}", err))
        } else {
            JobError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<validator::ValidationErrors> for JobError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut field_errors: Vec<String> = err
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let messages: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.as_ref()))
                    .collect();
                if messages.is_empty() {
                    format!("{}: invalid", field)
                } else {
                    format!("{}: {}", field, messages.join(", "))
                }
            })
            .collect();
        // HashMap iteration order is unstable
        field_errors.sort();

        JobError::Validation(field_errors.join("; "))
    }
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        JobError::TransientHandler(format!("I/O error: {}", err))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for JobError {
    fn from(err: redis::RedisError) -> Self {
        JobError::StoreUnavailable(format!("Redis error: {}", err))
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::error::Error> for JobError {
    fn from(err: lettre::error::Error) -> Self {
        JobError::Validation(format!("Failed to build email: {}", err))
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::address::AddressError> for JobError {
    fn from(err: lettre::address::AddressError) -> Self {
        JobError::Validation(format!("Invalid email address: {}", err))
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for JobError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        JobError::TransientHandler(format!("Failed to send email: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_lane_error() {
        let err = JobError::invalid_lane("send-fax");
        assert_eq!(err.to_string(), "Invalid lane: send-fax");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_validation_error() {
        let err = JobError::validation("rating: must be between 1 and 5");
        assert_eq!(err.to_string(), "Validation failed: rating: must be between 1 and 5");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transient_error_is_retryable() {
        let err = JobError::transient("connection reset");
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = JobError::Timeout(Duration::from_secs(5));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Handler timed out after 5s");
    }

    #[test]
    fn test_store_unavailable_maps_to_503() {
        let err = JobError::store_unavailable("connection refused");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.safe_message(), "Service unavailable");
    }

    #[test]
    fn test_permanent_failure_display() {
        let err = JobError::PermanentHandlerFailure {
            job_id: "job-1".to_string(),
            attempts: 3,
            reason: "smtp down".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Job job-1 failed permanently after 3 attempt(s): smtp down"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_internal_details_hidden_from_clients() {
        let err = JobError::internal("mutex poisoned at line 42");
        assert_eq!(err.safe_message(), "Internal server error");
    }

    #[test]
    fn test_from_serde_json_syntax_error() {
        let err: JobError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, JobError::Validation(_)));
    }

    #[test]
    fn test_from_io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "report.csv");
        let err: JobError = io.into();
        assert!(matches!(err, JobError::TransientHandler(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_into_response_status() {
        let response = JobError::invalid_lane("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = JobError::store_unavailable("down").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
