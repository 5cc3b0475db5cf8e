//! Checkout transactions and invoice identifiers.
//!
//! A transaction records one checkout/redirect attempt toward a payment
//! processor and owns exactly one item. It produces the processor-facing
//! `invoice_id`; for subscriptions a numeric subinvoice disambiguates
//! repeated billing cycles of the same agreement (PayPal rejects duplicate
//! invoice numbers).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::{ItemId, TransactionId};
use super::processor::ProcessorId;

/// Transaction for a one-time purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTransaction {
    pub id: TransactionId,
    pub processor: ProcessorId,
    pub creation_date: NaiveDate,
    /// The [`crate::domain::billing::SimpleItem`] this transaction bills.
    pub item: ItemId,
}

impl SimpleTransaction {
    /// One-time purchases bill exactly once.
    pub fn subinvoice(&self) -> u32 {
        1
    }

    /// Invoice id: `"<realm> p-<item_pk>"`.
    pub fn invoice_id(&self, realm: &str) -> String {
        format!("{} p-{}", realm, self.item)
    }
}

/// Transaction for a recurring purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTransaction {
    pub id: TransactionId,
    pub processor: ProcessorId,
    pub creation_date: NaiveDate,
    /// The [`crate::domain::billing::SubscriptionItem`] this transaction bills.
    pub item: ItemId,
}

impl SubscriptionTransaction {
    /// Invoice id: `"<realm> <item_pk>-<subinvoice>"`, with suffix `-u` when
    /// the item replaces an older subscription. The suffix keeps
    /// processor-side invoice numbers unique across a plan-upgrade chain.
    ///
    /// `subinvoice` must be resolved to the invoiced item's counter: when the
    /// item has an `old_subscription`, the caller follows that chain to the
    /// original transaction's item, collapsing the chain to one invoice
    /// lineage. The lifecycle service does this resolution.
    pub fn invoice_id(&self, realm: &str, subinvoice: u32, is_upgrade: bool) -> String {
        if is_upgrade {
            format!("{} {}-{}-u", realm, self.item, subinvoice)
        } else {
            format!("{} {}-{}", realm, self.item, subinvoice)
        }
    }
}

/// One checkout attempt toward a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transaction {
    Simple(SimpleTransaction),
    Subscription(SubscriptionTransaction),
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        match self {
            Transaction::Simple(tx) => tx.id,
            Transaction::Subscription(tx) => tx.id,
        }
    }

    pub fn item(&self) -> ItemId {
        match self {
            Transaction::Simple(tx) => tx.item,
            Transaction::Subscription(tx) => tx.item,
        }
    }

    pub fn processor(&self) -> &ProcessorId {
        match self {
            Transaction::Simple(tx) => &tx.processor,
            Transaction::Subscription(tx) => &tx.processor,
        }
    }
}
