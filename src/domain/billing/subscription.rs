//! Active subscriptions and completed payments.

use serde::{Deserialize, Serialize};

use super::ids::{PaymentId, SubscriptionId, TransactionId};
use super::processor::ProcessorId;

/// An automatic-payment agreement held at the processor.
///
/// Created when the processor confirms the subscriber signed up for
/// recurring charges. Cancelling it clears `active_subscription` on its
/// item and bumps the item's subinvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,

    /// The originating checkout transaction (1:1).
    pub transaction: TransactionId,

    /// Processor the agreement lives at; keys the API capability registry.
    pub processor: ProcessorId,

    /// Opaque agreement reference issued by the processor, e.g. PayPal's
    /// recurring_payment_id. Unset until the processor confirms.
    pub subscription_reference: Option<String>,

    /// Cached subscriber email. Some processors require notifying the
    /// customer days before every charge; reminders resolve their recipient
    /// from here.
    pub email: Option<String>,
}

/// How a completed charge was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Subscriber paid through a checkout redirect.
    Manual,
    /// Processor charged an active agreement automatically.
    Automatic,
}

/// A completed charge, 1:1 with its transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,

    pub transaction: TransactionId,

    pub kind: PaymentKind,

    /// Email the processor reported for the payer.
    pub email: Option<String>,
}
