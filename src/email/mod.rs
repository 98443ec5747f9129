//! Email sending
//!
//! Backends:
//! - `ConsoleMailer` - Prints emails to stdout (for development)
//! - `SmtpMailer` - Sends emails via SMTP using lettre (feature `smtp`)
//!
//! # Example
//!
//! ```rust,ignore
//! use coursefeed_jobs::email::{Email, SmtpMailer, SmtpConfig};
//! use coursefeed_jobs::traits::mailer::Mailer;
//!
//! let config = SmtpConfig::new("smtp.example.com")
//!     .credentials("user", "password")
//!     .from("\"Student Feedback App\" <no-reply@feedbackapp.com>");
//! let mailer = SmtpMailer::new(config)?;
//!
//! let email = Email::new("", "admin@example.com", "New Feedback Submitted")
//!     .text("alice@uni.edu submitted feedback for Rust 101 with rating 5");
//! mailer.send(&email).await?;
//! ```

mod config;
mod console;
#[cfg(feature = "smtp")]
mod smtp;

pub use config::{MailConfig, MailTransport};
pub use console::ConsoleMailer;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpConfig, SmtpMailer};

pub use crate::traits::mailer::{Attachment, Email};
