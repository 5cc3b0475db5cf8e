//! Record store port for billing aggregates.
//!
//! Defines the persistence contract consumed by the lifecycle service and
//! the reminder scheduler. Implementations handle the actual storage.
//!
//! # Design
//!
//! - **Atomic cancel**: clearing the active subscription and bumping the
//!   subinvoice is one conditional update keyed by primary key, never a
//!   read-modify-write round trip
//! - **Narrow reads**: the activity projection fetches only the three
//!   fields that determine whether a subscription is active
//! - **Soft-stale reads allowed**: reminder sweeps may observe due dates
//!   stale by one sweep interval; reminders are a nudge, not a billing
//!   authority

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::billing::{
    ActivityFields, BillingError, Item, ItemId, Payment, RecordKind, Subscription,
    SubscriptionId, SubscriptionItem, Transaction, TransactionId,
};

/// Errors from record store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: u64 },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for BillingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => BillingError::RecordNotFound { kind, id },
            StoreError::Backend(msg) => BillingError::Store(msg),
        }
    }
}

/// Selection criteria for one reminder sweep pass.
///
/// Matches subscription items whose watermark is below `reminders_sent_below`
/// and whose due date is on or before the horizon, split by trial flag.
/// Deadline-eligible items are a subset (deadline >= due date), so one query
/// per class covers all three tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderQuery {
    /// Match trial items (true) or regular items (false).
    pub trial: bool,

    /// Upper bound on `due_payment_date`, inclusive.
    pub due_on_or_before: NaiveDate,

    /// Strict upper bound on `reminders_sent`.
    pub reminders_sent_below: u8,
}

/// Port for billing record persistence.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Fetch an item by primary key. `None` when absent.
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Insert or replace an item.
    async fn save_item(&self, item: &Item) -> Result<(), StoreError>;

    /// Fetch only the fields that determine subscription activity.
    ///
    /// Documented optimization of [`BillingStore::get_item`], not a
    /// different contract.
    async fn fetch_activity_fields(&self, id: ItemId)
        -> Result<Option<ActivityFields>, StoreError>;

    /// Subscription items eligible for a reminder sweep pass.
    async fn find_reminder_candidates(
        &self,
        query: ReminderQuery,
    ) -> Result<Vec<SubscriptionItem>, StoreError>;

    /// Atomically clear `active_subscription` and increment `subinvoice` on
    /// one subscription item, keyed by primary key.
    ///
    /// Returns the incremented subinvoice. Must be a single conditional
    /// update so that a callback-driven cancel racing a renewal's bump
    /// cannot lose either increment.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the item is absent or not a subscription item
    async fn cancel_active_subscription(&self, id: ItemId) -> Result<u32, StoreError>;

    /// Fetch a transaction by primary key.
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Insert or replace a transaction.
    async fn save_transaction(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// Fetch a subscription by primary key.
    async fn get_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Fetch the subscription created for a transaction, if any (1:1).
    async fn find_subscription_by_transaction(
        &self,
        transaction: TransactionId,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Insert or replace a subscription.
    async fn save_subscription(&self, subscription: &Subscription) -> Result<(), StoreError>;

    /// Record a completed charge.
    async fn save_payment(&self, payment: &Payment) -> Result<(), StoreError>;
}
