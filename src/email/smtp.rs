//! SMTP mailer using lettre

use crate::error::{JobError, Result};
use crate::traits::mailer::{Email, Mailer};
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as MailAttachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// SMTP configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port (default: 587 for STARTTLS)
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Used when an email has no "from" address
    pub default_from: Option<String>,
    /// Use STARTTLS (default: true)
    pub starttls: bool,
}

impl SmtpConfig {
    /// Create a new SMTP configuration with the server hostname
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: None,
            password: None,
            default_from: None,
            starttls: true,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.default_from = Some(address.into());
        self
    }

    /// Disable STARTTLS (use plain connection or implicit TLS)
    pub fn no_starttls(mut self) -> Self {
        self.starttls = false;
        self
    }

    /// Create config from environment variables
    ///
    /// Reads `SMTP_HOST` (required), `SMTP_PORT`, `SMTP_USERNAME`,
    /// `SMTP_PASSWORD`, `SMTP_FROM` and `SMTP_STARTTLS`, each optionally
    /// prefixed with `COURSEFEED_`.
    pub fn from_env() -> Result<Self> {
        let host = get_env_with_prefix("SMTP_HOST")
            .ok_or_else(|| JobError::internal("SMTP_HOST environment variable not set"))?;

        Ok(Self {
            host,
            port: parse_env_with_prefix("SMTP_PORT").unwrap_or(587),
            username: get_env_with_prefix("SMTP_USERNAME"),
            password: get_env_with_prefix("SMTP_PASSWORD"),
            default_from: get_env_with_prefix("SMTP_FROM"),
            starttls: get_env_with_prefix("SMTP_STARTTLS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        })
    }
}

/// SMTP mailer using lettre
///
/// Address and message-building problems surface as `Validation` errors
/// (never retried); transport failures as `TransientHandler` errors.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpMailer {
    /// Create a new SMTP mailer with the given configuration
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        }
        .map_err(|e| JobError::internal(format!("Failed to create SMTP transport: {}", e)))?;

        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    /// Create a new SMTP mailer from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(SmtpConfig::from_env()?)
    }

    fn build_message(&self, email: &Email) -> Result<Message> {
        let from_str = if email.from.is_empty() {
            self.config
                .default_from
                .as_deref()
                .ok_or_else(|| JobError::validation("No 'from' address specified and no default configured"))?
        } else {
            email.from.as_str()
        };

        let from: Mailbox = from_str
            .parse()
            .map_err(|e| JobError::validation(format!("Invalid 'from' address: {}", e)))?;

        let mut builder = Message::builder().from(from).subject(&email.subject);

        for to in &email.to {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| JobError::validation(format!("Invalid 'to' address '{}': {}", to, e)))?;
            builder = builder.to(mailbox);
        }

        if let Some(ref reply_to) = email.reply_to {
            let mailbox: Mailbox = reply_to
                .parse()
                .map_err(|e| JobError::validation(format!("Invalid 'reply_to' address: {}", e)))?;
            builder = builder.reply_to(mailbox);
        }

        if email.attachments.is_empty() {
            let message = match (&email.text, &email.html) {
                (Some(text), Some(html)) => {
                    builder.multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))
                }
                (Some(text), None) => builder.header(ContentType::TEXT_PLAIN).body(text.clone()),
                (None, Some(html)) => builder.header(ContentType::TEXT_HTML).body(html.clone()),
                (None, None) => {
                    return Err(JobError::validation("Email must have either text or HTML body"));
                }
            };
            return message.map_err(Into::into);
        }

        let mut mixed = match (&email.text, &email.html) {
            (Some(text), Some(html)) => {
                MultiPart::mixed().multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))
            }
            (Some(text), None) => MultiPart::mixed().singlepart(SinglePart::plain(text.clone())),
            (None, Some(html)) => MultiPart::mixed().singlepart(SinglePart::html(html.clone())),
            (None, None) => {
                return Err(JobError::validation("Email must have either text or HTML body"));
            }
        };

        for attachment in &email.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                JobError::validation(format!("Invalid content type '{}': {}", attachment.content_type, e))
            })?;
            mixed = mixed.singlepart(
                MailAttachment::new(attachment.filename.clone()).body(attachment.content.clone(), content_type),
            );
        }

        Ok(builder.multipart(mixed)?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;

        let message = self.build_message(email)?;

        self.transport.send(message).await?;

        tracing::debug!(
            recipients = email.to.len(),
            attachments = email.attachments.len(),
            "Email sent via SMTP"
        );
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        // Connection problems surface per send
        true
    }
}

// AsyncSmtpTransport doesn't impl Debug
impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .finish()
    }
}
