//! Notification sender port.
//!
//! Rendering takes a template id plus a data bag and returns text; sending
//! delivers it. Callers are responsible for skipping items without a
//! recipient — a missing email is expected, not exceptional, so it never
//! reaches this port.

use async_trait::async_trait;
use thiserror::Error;

/// Message templates the billing engine dispatches.
///
/// Regular and trial reminders share templates; the `days_before` field in
/// the data bag differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    /// Payment falls due within the configured lead time.
    BeforeDueReminder,
    /// Payment is due today or overdue.
    DueReminder,
    /// The grace deadline has passed.
    DeadlineReminder,
    /// The processor agreement was cancelled.
    SubscriptionCanceled,
}

/// Errors from rendering or delivery.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("template render failed: {0}")]
    Render(String),

    #[error("delivery failed: {0}")]
    Send(String),
}

/// Port for rendering and delivering notifications.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Render a template with the given data bag.
    fn render(&self, template: TemplateId, data: &serde_json::Value)
        -> Result<String, NotifyError>;

    /// Deliver a rendered message.
    async fn send(&self, subject: &str, body: &str, to: &str) -> Result<(), NotifyError>;
}
