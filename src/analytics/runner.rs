//! Batch analytics tasks

use super::sentiment::{classify, Sentiment};
use super::source::{CourseRating, FeedbackSource};
use crate::error::Result;
use crate::jobs::AnalyticsTask;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a task run touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub task: AnalyticsTask,
    /// Entries or courses looked at
    pub examined: usize,
    /// Entries or courses written
    pub updated: usize,
    /// Referenced entries that disappeared mid-run
    pub skipped: usize,
}

/// Runs the named batch computations of the analytics lane
#[async_trait]
pub trait AnalyticsRunner: Send + Sync {
    async fn run(&self, task: AnalyticsTask) -> Result<AnalyticsSummary>;
}

/// Analytics over a [`FeedbackSource`]
#[derive(Clone)]
pub struct FeedbackAnalytics {
    source: Arc<dyn FeedbackSource>,
}

impl FeedbackAnalytics {
    pub fn new(source: Arc<dyn FeedbackSource>) -> Self {
        Self { source }
    }

    async fn update_sentiment(&self) -> Result<AnalyticsSummary> {
        let feedback = self.source.neutral_feedback().await?;
        let mut summary = AnalyticsSummary {
            task: AnalyticsTask::UpdateSentiment,
            examined: feedback.len(),
            updated: 0,
            skipped: 0,
        };

        for item in feedback {
            let sentiment = classify(item.rating, item.message.as_deref());
            if sentiment == Sentiment::Neutral {
                continue;
            }
            if self.source.set_sentiment(&item.id, sentiment).await? {
                summary.updated += 1;
            } else {
                tracing::info!(feedback_id = %item.id, "Feedback vanished before sentiment update, skipping");
                summary.skipped += 1;
            }
        }
        Ok(summary)
    }

    async fn update_course_avg(&self) -> Result<AnalyticsSummary> {
        let ratings = self.source.ratings().await?;
        let examined = ratings.len();
        let course_ratings = course_averages(ratings);

        self.source.save_course_ratings(&course_ratings).await?;
        Ok(AnalyticsSummary {
            task: AnalyticsTask::UpdateCourseAvg,
            examined,
            updated: course_ratings.len(),
            skipped: 0,
        })
    }
}

#[async_trait]
impl AnalyticsRunner for FeedbackAnalytics {
    async fn run(&self, task: AnalyticsTask) -> Result<AnalyticsSummary> {
        match task {
            AnalyticsTask::UpdateSentiment => self.update_sentiment().await,
            AnalyticsTask::UpdateCourseAvg => self.update_course_avg().await,
        }
    }
}

/// Average rating (two decimals) and count per course, ordered by course id
pub fn course_averages(ratings: impl IntoIterator<Item = (String, u8)>) -> Vec<CourseRating> {
    let mut sums: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for (course_id, rating) in ratings {
        let entry = sums.entry(course_id).or_default();
        entry.0 += u64::from(rating);
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(course_id, (sum, count))| CourseRating {
            course_id,
            avg_rating: round2(sum as f64 / count as f64),
            total_feedback: count,
        })
        .collect()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
