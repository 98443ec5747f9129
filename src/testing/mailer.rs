//! Mailer fakes

use crate::error::{JobError, Result};
use crate::traits::mailer::{Email, Mailer};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Keeps every sent email in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All emails sent so far, oldest first
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Emails addressed to `recipient`
    pub fn sent_to(&self, recipient: &str) -> Vec<Email> {
        self.sent()
            .into_iter()
            .filter(|email| email.to.iter().any(|to| to == recipient))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;
        self.sent
            .lock()
            .map_err(|_| JobError::internal("RecordingMailer lock poisoned"))?
            .push(email.clone());
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Fails sends with a transient error, then delegates to a [`RecordingMailer`]
///
/// Failures can be limited to a number of sends or to specific recipients.
#[derive(Debug, Clone)]
pub struct FailingMailer {
    inner: RecordingMailer,
    remaining_failures: Arc<AtomicUsize>,
    failing_recipients: Arc<Mutex<HashSet<String>>>,
    attempts: Arc<AtomicUsize>,
}

impl FailingMailer {
    /// Every send fails
    pub fn always() -> Self {
        Self::times(usize::MAX)
    }

    /// The first `n` sends fail
    pub fn times(n: usize) -> Self {
        Self {
            inner: RecordingMailer::new(),
            remaining_failures: Arc::new(AtomicUsize::new(n)),
            failing_recipients: Arc::new(Mutex::new(HashSet::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Only sends to `recipient` fail, until [`recover`](Self::recover)
    pub fn failing_for(recipient: impl Into<String>) -> Self {
        let mailer = Self::times(0);
        if let Ok(mut recipients) = mailer.failing_recipients.lock() {
            recipients.insert(recipient.into());
        }
        mailer
    }

    /// Stop failing
    pub fn recover(&self) {
        self.remaining_failures.store(0, Ordering::SeqCst);
        if let Ok(mut recipients) = self.failing_recipients.lock() {
            recipients.clear();
        }
    }

    /// Sends attempted, failed or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The emails that went through
    pub fn delivered(&self) -> &RecordingMailer {
        &self.inner
    }

    fn should_fail(&self, email: &Email) -> bool {
        let blocked = self
            .failing_recipients
            .lock()
            .map(|recipients| email.to.iter().any(|to| recipients.contains(to)))
            .unwrap_or(false);
        if blocked {
            return true;
        }
        self.remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail(email) {
            return Err(JobError::transient("SMTP connection refused"));
        }
        self.inner.send(email).await
    }

    fn is_healthy(&self) -> bool {
        self.remaining_failures.load(Ordering::SeqCst) == 0
    }
}
