//! Billing domain: periods, items, transactions, identities, subscriptions.
//!
//! Pure lifecycle logic. Persistence, email delivery, and processor
//! transport live behind ports; nothing in here performs I/O.

mod errors;
mod identity;
mod ids;
mod item;
mod period;
mod processor;
mod subscription;
mod transaction;

pub use errors::{BillingError, RecordKind};
pub use identity::TransactionIdentity;
pub use ids::{ItemId, PaymentId, SubscriptionId, TransactionId};
pub use item::{
    reminder_watermark, ActivityFields, Item, ItemCommon, ProlongItem, SimpleItem,
    SubscriptionItem,
};
pub use period::{day_needs_adjustment, CalendarDelta, Period, PeriodUnit};
pub use processor::{PaymentProcessor, ProcessorId};
pub use subscription::{Payment, PaymentKind, Subscription};
pub use transaction::{SimpleTransaction, SubscriptionTransaction, Transaction};
