//! Mail configuration

use crate::error::Result;
use crate::traits::mailer::Mailer;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which mail transport handlers send through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Print to stdout (development)
    #[default]
    Console,
    #[cfg(feature = "smtp")]
    Smtp,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    #[serde(default)]
    pub transport: MailTransport,

    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default, skip_serializing)]
    pub smtp_password: Option<String>,

    #[serde(default = "default_starttls")]
    pub smtp_starttls: bool,

    /// Sender used by every job-generated email
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Who receives new-feedback notifications
    #[serde(default = "default_admin_recipients")]
    pub admin_recipients: Vec<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::default(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_starttls: default_starttls(),
            from_address: default_from_address(),
            admin_recipients: default_admin_recipients(),
        }
    }
}

impl MailConfig {
    /// Load mail configuration from environment variables
    ///
    /// `ADMIN_EMAILS` is a comma-separated list.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(transport) = get_env_with_prefix("MAIL_TRANSPORT") {
            config.transport = match transport.to_lowercase().as_str() {
                #[cfg(feature = "smtp")]
                "smtp" => MailTransport::Smtp,
                _ => MailTransport::Console,
            };
        }

        config.smtp_host = get_env_with_prefix("SMTP_HOST");
        if let Some(port) = parse_env_with_prefix("SMTP_PORT") {
            config.smtp_port = port;
        }
        config.smtp_username = get_env_with_prefix("SMTP_USERNAME");
        config.smtp_password = get_env_with_prefix("SMTP_PASSWORD");
        if let Some(starttls) = get_env_with_prefix("SMTP_STARTTLS") {
            config.smtp_starttls = starttls != "false" && starttls != "0";
        }
        if let Some(from) = get_env_with_prefix("MAIL_FROM").or_else(|| get_env_with_prefix("SMTP_FROM")) {
            config.from_address = from;
        }
        if let Some(admins) = get_env_with_prefix("ADMIN_EMAILS") {
            config.admin_recipients = parse_list(&admins);
        }

        config
    }

    /// Build the configured mailer
    pub fn build_mailer(&self) -> Result<Arc<dyn Mailer>> {
        match self.transport {
            MailTransport::Console => Ok(Arc::new(
                super::ConsoleMailer::new().with_default_from(self.from_address.clone()),
            )),
            #[cfg(feature = "smtp")]
            MailTransport::Smtp => {
                let host = self
                    .smtp_host
                    .as_deref()
                    .ok_or_else(|| crate::error::JobError::validation("smtp_host is required for the smtp transport"))?;
                let mut smtp = super::SmtpConfig::new(host)
                    .port(self.smtp_port)
                    .from(self.from_address.clone());
                if let (Some(user), Some(pass)) = (&self.smtp_username, &self.smtp_password) {
                    smtp = smtp.credentials(user.clone(), pass.clone());
                }
                if !self.smtp_starttls {
                    smtp = smtp.no_starttls();
                }
                Ok(Arc::new(super::SmtpMailer::new(smtp)?))
            }
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

fn default_from_address() -> String {
    "\"Student Feedback App\" <no-reply@feedbackapp.com>".to_string()
}

fn default_admin_recipients() -> Vec<String> {
    vec!["admin1@example.com".to_string(), "admin2@example.com".to_string()]
}
