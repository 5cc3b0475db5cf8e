//! Ports: contracts for external collaborators.
//!
//! The billing core consumes a record store, a notification sender, and
//! per-processor API capabilities. Adapters implement these traits;
//! application services depend only on the traits.

mod billing_store;
mod notification_sender;
mod processor_api;

pub use billing_store::{BillingStore, ReminderQuery, StoreError};
pub use notification_sender::{NotificationSender, NotifyError, TemplateId};
pub use processor_api::{ProcessorApi, ProcessorApiError, ProcessorRegistry};
