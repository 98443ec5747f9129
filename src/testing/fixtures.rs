//! Test data helpers

use crate::analytics::{FeedbackItem, Sentiment};
use uuid::Uuid;

/// Helper functions for generating fake test data
pub mod fake {
    use super::*;

    /// Generate a fake email address
    pub fn email() -> String {
        format!("test-{}@example.com", Uuid::new_v4().simple())
    }

    /// Generate a fake UUID as a string
    pub fn uuid() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate a fake course name
    pub fn course() -> String {
        format!("Course {}", &Uuid::new_v4().simple().to_string()[..8])
    }
}

/// Builder for feedback entries fed to analytics
#[derive(Debug, Clone)]
pub struct TestFeedback {
    item: FeedbackItem,
}

impl TestFeedback {
    /// Neutral feedback for `course_id` with the given rating
    pub fn new(course_id: impl Into<String>, rating: u8) -> Self {
        Self {
            item: FeedbackItem {
                id: fake::uuid(),
                course_id: course_id.into(),
                student_id: fake::uuid(),
                rating,
                message: None,
                sentiment: Sentiment::Neutral,
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.item.id = id.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.item.message = Some(message.into());
        self
    }

    pub fn sentiment(mut self, sentiment: Sentiment) -> Self {
        self.item.sentiment = sentiment;
        self
    }

    pub fn build(self) -> FeedbackItem {
        self.item
    }
}
