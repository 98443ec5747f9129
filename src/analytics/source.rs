//! Access to feedback data for batch analytics

use super::sentiment::Sentiment;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One feedback entry as seen by analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
    pub id: String,
    pub course_id: String,
    pub student_id: String,
    /// 1..=5
    pub rating: u8,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sentiment: Sentiment,
}

/// Aggregated rating of one course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRating {
    pub course_id: String,
    /// Rounded to two decimals
    pub avg_rating: f64,
    pub total_feedback: u64,
}

/// The feedback collection, as far as analytics needs it
///
/// Implemented by the web service over its document store.
#[async_trait]
pub trait FeedbackSource: Send + Sync {
    /// Feedback whose sentiment is still `neutral`
    async fn neutral_feedback(&self) -> Result<Vec<FeedbackItem>>;

    /// Update one entry's sentiment; `Ok(false)` if it no longer exists
    async fn set_sentiment(&self, feedback_id: &str, sentiment: Sentiment) -> Result<bool>;

    /// `(course_id, rating)` for every feedback entry
    async fn ratings(&self) -> Result<Vec<(String, u8)>>;

    /// Replace the stored per-course aggregates
    async fn save_course_ratings(&self, ratings: &[CourseRating]) -> Result<()>;
}
