//! The mail-sending boundary

use crate::EmailMessage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Errors from the mail transport
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("send failed: {0}")]
    Send(String),
}

/// Best-effort asynchronous mail delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError>;
}

/// Test mailer: records every accepted message, optionally failing the
/// first N sends to exercise the retry path
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failures_remaining: AtomicU32,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` sends before accepting any
    pub fn fail_times(self, count: u32) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Messages accepted so far
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(MailerError::Send("simulated transport failure".into()));
        }
        self.sent
            .lock()
            .expect("mailer lock poisoned")
            .push(message.clone());
        Ok(())
    }
}
