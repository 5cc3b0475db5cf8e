//! Billing domain error types.
//!
//! Decode and validation failures are returned as typed errors to the
//! boundary that can act on them (a callback handler maps
//! `UnknownTransaction` to a rejected request). Reminder dispatch failures
//! are logged and skipped per item inside the sweep; they never reach here.

use thiserror::Error;

use super::ids::{ItemId, SubscriptionId, TransactionId};

/// Kind of record a failed lookup was after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Item,
    Transaction,
    Subscription,
    Payment,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordKind::Item => "item",
            RecordKind::Transaction => "transaction",
            RecordKind::Subscription => "subscription",
            RecordKind::Payment => "payment",
        };
        write!(f, "{}", s)
    }
}

/// Errors surfaced by the billing lifecycle engine.
#[derive(Debug, Clone, Error)]
pub enum BillingError {
    /// A processor callback carried an identity string we do not recognize:
    /// malformed, wrong realm, unparseable pk, or bad MAC. Always means
    /// "reject this callback"; never retried internally.
    #[error("unknown transaction identity")]
    UnknownTransaction,

    /// A processor API call failed. Local state is left unchanged.
    #[error("processor '{processor}' call failed: {message}")]
    ProcessorError { processor: String, message: String },

    /// A referenced record does not exist.
    #[error("{kind} {id} not found")]
    RecordNotFound { kind: RecordKind, id: u64 },

    /// The record exists but is the wrong item variant for the operation.
    #[error("item {0} is not a {1}")]
    WrongItemKind(ItemId, &'static str),

    /// Record store infrastructure failure.
    #[error("store error: {0}")]
    Store(String),
}

impl BillingError {
    pub fn item_not_found(id: ItemId) -> Self {
        BillingError::RecordNotFound {
            kind: RecordKind::Item,
            id: id.value(),
        }
    }

    pub fn transaction_not_found(id: TransactionId) -> Self {
        BillingError::RecordNotFound {
            kind: RecordKind::Transaction,
            id: id.value(),
        }
    }

    pub fn subscription_not_found(id: SubscriptionId) -> Self {
        BillingError::RecordNotFound {
            kind: RecordKind::Subscription,
            id: id.value(),
        }
    }

    pub fn processor(processor: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ProcessorError {
            processor: processor.into(),
            message: message.into(),
        }
    }
}
