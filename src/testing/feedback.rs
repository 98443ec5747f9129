//! In-memory feedback collection for analytics tests

use crate::analytics::{CourseRating, FeedbackItem, FeedbackSource, Sentiment};
use crate::error::{JobError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct InMemoryFeedbackSource {
    items: Arc<RwLock<Vec<FeedbackItem>>>,
    course_ratings: Arc<RwLock<HashMap<String, CourseRating>>>,
}

impl InMemoryFeedbackSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feedback(items: impl IntoIterator<Item = FeedbackItem>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items.into_iter().collect())),
            ..Self::default()
        }
    }

    pub async fn insert(&self, item: FeedbackItem) {
        self.items.write().await.push(item);
    }

    /// Delete an entry, as the web service would
    pub async fn remove(&self, feedback_id: &str) {
        self.items.write().await.retain(|item| item.id != feedback_id);
    }

    pub async fn sentiment_of(&self, feedback_id: &str) -> Option<Sentiment> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.id == feedback_id)
            .map(|item| item.sentiment)
    }

    /// Aggregates saved by the last `updateCourseAvg` run
    pub async fn course_rating(&self, course_id: &str) -> Option<CourseRating> {
        self.course_ratings.read().await.get(course_id).cloned()
    }
}

#[async_trait]
impl FeedbackSource for InMemoryFeedbackSource {
    async fn neutral_feedback(&self) -> Result<Vec<FeedbackItem>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|item| item.sentiment == Sentiment::Neutral)
            .cloned()
            .collect())
    }

    async fn set_sentiment(&self, feedback_id: &str, sentiment: Sentiment) -> Result<bool> {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|item| item.id == feedback_id) {
            Some(item) => {
                item.sentiment = sentiment;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ratings(&self) -> Result<Vec<(String, u8)>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .map(|item| (item.course_id.clone(), item.rating))
            .collect())
    }

    async fn save_course_ratings(&self, ratings: &[CourseRating]) -> Result<()> {
        if ratings.iter().any(|r| r.course_id.is_empty()) {
            return Err(JobError::validation("course_id: must not be empty"));
        }
        let mut saved = self.course_ratings.write().await;
        saved.clear();
        saved.extend(ratings.iter().map(|r| (r.course_id.clone(), r.clone())));
        Ok(())
    }
}
