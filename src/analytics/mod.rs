//! Batch analytics run by the `analytics` lane
//!
//! - `updateSentiment` reclassifies feedback still marked `neutral`
//! - `updateCourseAvg` recomputes per-course average ratings

mod runner;
mod sentiment;
mod source;

pub use runner::{course_averages, AnalyticsRunner, AnalyticsSummary, FeedbackAnalytics};
pub use sentiment::{classify, score_text, Sentiment};
pub use source::{CourseRating, FeedbackItem, FeedbackSource};
