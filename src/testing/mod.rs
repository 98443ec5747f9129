//! Fakes and fixtures for testing code that embeds the job system
//!
//! # Example
//!
//! ```rust,ignore
//! use coursefeed_jobs::testing::RecordingMailer;
//! use coursefeed_jobs::JobContext;
//! use std::sync::Arc;
//!
//! let mailer = RecordingMailer::new();
//! let ctx = JobContext::builder().with_mailer(Arc::new(mailer.clone())).build()?;
//! // run a job ...
//! assert_eq!(mailer.sent_to("admin1@example.com").len(), 1);
//! ```

mod feedback;
mod fixtures;
mod mailer;

pub use feedback::InMemoryFeedbackSource;
pub use fixtures::{fake, TestFeedback};
pub use mailer::{FailingMailer, RecordingMailer};
