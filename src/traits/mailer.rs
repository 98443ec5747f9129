//! Mailer trait for sending emails
//!
//! Abstracts the mail transport so handlers can run against SMTP in
//! production, the console in development, or a recording fake in tests.

use crate::error::{JobError, Result};
use async_trait::async_trait;

/// A file attached to an email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Name shown to the recipient (e.g., "feedback-report.csv")
    pub filename: String,
    /// MIME type (e.g., "text/csv")
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content,
        }
    }

    /// Guess the content type from the file extension
    pub fn from_bytes(filename: impl Into<String>, content: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = content_type_for(&filename).to_string();
        Self {
            filename,
            content_type,
            content,
        }
    }
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("html") | Some("htm") => "text/html",
        _ => "application/octet-stream",
    }
}

/// An email message to be sent
#[derive(Debug, Clone)]
pub struct Email {
    /// Sender address; empty means "use the mailer's default"
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    /// Plain text body (optional if html is provided)
    pub text: Option<String>,
    /// HTML body (optional if text is provided)
    pub html: Option<String>,
    pub reply_to: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Create a new email with the required fields
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: vec![to.into()],
            subject: subject.into(),
            text: None,
            html: None,
            reply_to: None,
            attachments: Vec::new(),
        }
    }

    /// Add a recipient
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Set the plain text body
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text = Some(body.into());
        self
    }

    /// Set the HTML body
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html = Some(body.into());
        self
    }

    /// Set the HTML body if one is given
    pub fn html_opt(mut self, body: Option<String>) -> Self {
        self.html = body;
        self
    }

    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Validate the email has required fields
    ///
    /// An empty `from` is allowed here; mailers fill in their default.
    pub fn validate(&self) -> Result<()> {
        if self.to.is_empty() || self.to.iter().any(|t| t.trim().is_empty()) {
            return Err(JobError::validation("Email 'to' is required"));
        }
        if self.subject.is_empty() {
            return Err(JobError::validation("Email 'subject' is required"));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(JobError::validation("Email must have either 'text' or 'html' body"));
        }
        Ok(())
    }
}

/// Mailer trait for sending emails
///
/// Errors from `send` are treated as transient by the workers unless they
/// are validation errors, which can never succeed on a retry.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send an email
    async fn send(&self, email: &Email) -> Result<()>;

    /// Check if the mailer backend is healthy/connected
    fn is_healthy(&self) -> bool;
}
