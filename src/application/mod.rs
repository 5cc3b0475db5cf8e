//! Application layer: services orchestrating domain logic over ports.

mod lifecycle;
mod reminders;

pub use lifecycle::{LifecycleService, PaymentNotice};
pub use reminders::{ReminderScheduler, SweepStats};
