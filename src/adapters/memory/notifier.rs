//! Recording notification sender.
//!
//! Renders templates into a plain-text body and records every delivery
//! instead of talking to a mail gateway. Failure injection lets tests
//! exercise the scheduler's isolation guarantees.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{NotificationSender, NotifyError, TemplateId};

/// One delivery captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub subject: String,
    pub body: String,
    pub to: String,
}

/// [`NotificationSender`] that keeps deliveries in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    fail_sends: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `send` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Deliveries recorded so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    fn render(
        &self,
        template: TemplateId,
        data: &serde_json::Value,
    ) -> Result<String, NotifyError> {
        Ok(format!("{:?}: {}", template, data))
    }

    async fn send(&self, subject: &str, body: &str, to: &str) -> Result<(), NotifyError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(NotifyError::Send("gateway unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentMessage {
                subject: subject.to_string(),
                body: body.to_string(),
                to: to.to_string(),
            });
        Ok(())
    }
}
