//! Console mailer for development
//!
//! Prints emails to stdout instead of sending them. Body content is
//! redacted by default since stdout is often captured by log collectors.

use crate::error::Result;
use crate::traits::mailer::{Email, Mailer};
use async_trait::async_trait;

/// A mailer that prints emails to stdout instead of sending them
///
/// **FOR DEVELOPMENT USE ONLY.** Use `with_full_output(true)` to print
/// bodies as well as metadata.
#[derive(Debug, Clone)]
pub struct ConsoleMailer {
    prefix: String,
    show_full_content: bool,
    default_from: String,
}

impl ConsoleMailer {
    pub fn new() -> Self {
        Self {
            prefix: "[EMAIL]".to_string(),
            show_full_content: false,
            default_from: String::new(),
        }
    }

    /// Create a console mailer with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::new()
        }
    }

    /// Shown when an email has no "from" address
    pub fn with_default_from(mut self, from: impl Into<String>) -> Self {
        self.default_from = from.into();
        self
    }

    /// Enable or disable full email content output
    pub fn with_full_output(mut self, enabled: bool) -> Self {
        if enabled {
            tracing::warn!("ConsoleMailer: full output enabled - email content will be visible in logs");
        }
        self.show_full_content = enabled;
        self
    }

    fn render(&self, email: &Email) -> Vec<String> {
        let p = &self.prefix;
        let from = if email.from.is_empty() { &self.default_from } else { &email.from };

        let mut lines = vec![
            format!("{} ========================================", p),
            format!("{} From:    {}", p, from),
            format!("{} To:      {} recipient(s)", p, email.to.len()),
        ];
        if email.reply_to.is_some() {
            lines.push(format!("{} Reply-To: [set]", p));
        }
        lines.push(format!("{} Subject: {}", p, email.subject));
        lines.push(format!("{} ----------------------------------------", p));

        if self.show_full_content {
            if let Some(ref text) = email.text {
                lines.push(format!("{} [TEXT]", p));
                lines.extend(text.lines().map(|l| format!("{} {}", p, l)));
            }
            if let Some(ref html) = email.html {
                lines.push(format!("{} [HTML]", p));
                lines.extend(html.lines().map(|l| format!("{} {}", p, l)));
            }
        } else {
            if let Some(ref text) = email.text {
                lines.push(format!("{} [TEXT] {} bytes [REDACTED]", p, text.len()));
            }
            if let Some(ref html) = email.html {
                lines.push(format!("{} [HTML] {} bytes [REDACTED]", p, html.len()));
            }
        }

        for attachment in &email.attachments {
            lines.push(format!(
                "{} [ATTACHMENT] {} ({}, {} bytes)",
                p,
                attachment.filename,
                attachment.content_type,
                attachment.content.len()
            ));
        }

        lines.push(format!("{} ========================================", p));
        lines
    }
}

impl Default for ConsoleMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;

        for line in self.render(email) {
            println!("{}", line);
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::mailer::Attachment;

    #[tokio::test]
    async fn test_console_mailer_sends_without_error() {
        let mailer = ConsoleMailer::new();
        let email = Email::new("from@test.com", "to@test.com", "Test Subject").text("Test body");
        assert!(mailer.send(&email).await.is_ok());
    }

    #[tokio::test]
    async fn test_console_mailer_validates_email() {
        let mailer = ConsoleMailer::new();
        // No body
        let email = Email::new("from@test.com", "to@test.com", "Test Subject");
        assert!(mailer.send(&email).await.is_err());
    }

    #[test]
    fn test_redacts_body_by_default() {
        let mailer = ConsoleMailer::new().with_default_from("no-reply@feedbackapp.com");
        let email = Email::new("", "to@test.com", "Secret").text("reset token 123");
        let output = mailer.render(&email).join("\n");
        assert!(!output.contains("reset token 123"));
        assert!(output.contains("[REDACTED]"));
        assert!(output.contains("no-reply@feedbackapp.com"));
    }

    #[test]
    fn test_lists_attachments() {
        let mailer = ConsoleMailer::new().with_full_output(true);
        let email = Email::new("a@b.com", "to@test.com", "Report")
            .text("See attached")
            .attach(Attachment::from_bytes("report.csv", vec![1, 2, 3]));
        let output = mailer.render(&email).join("\n");
        assert!(output.contains("See attached"));
        assert!(output.contains("report.csv (text/csv, 3 bytes)"));
    }
}
