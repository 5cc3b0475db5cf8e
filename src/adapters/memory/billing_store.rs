//! In-memory billing store.
//!
//! Backs tests and single-process deployments. One mutex over all tables
//! makes every method atomic, which is exactly the contract
//! `cancel_active_subscription` needs: the clear and the increment happen
//! under one lock acquisition, never as separate read and write round
//! trips.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::billing::{
    ActivityFields, Item, ItemId, Payment, PaymentId, RecordKind, Subscription, SubscriptionId,
    SubscriptionItem, Transaction, TransactionId,
};
use crate::ports::{BillingStore, ReminderQuery, StoreError};

#[derive(Default)]
struct Tables {
    items: HashMap<ItemId, Item>,
    transactions: HashMap<TransactionId, Transaction>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    payments: HashMap<PaymentId, Payment>,
}

/// Mutex-backed implementation of [`BillingStore`].
#[derive(Default)]
pub struct InMemoryBillingStore {
    tables: Mutex<Tables>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored payments. Test helper.
    pub fn payment_count(&self) -> usize {
        self.lock().payments.len()
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.lock().items.get(&id).cloned())
    }

    async fn save_item(&self, item: &Item) -> Result<(), StoreError> {
        self.lock().items.insert(item.id(), item.clone());
        Ok(())
    }

    async fn fetch_activity_fields(
        &self,
        id: ItemId,
    ) -> Result<Option<ActivityFields>, StoreError> {
        let tables = self.lock();
        let Some(Item::Subscription(item)) = tables.items.get(&id) else {
            return Ok(None);
        };
        Ok(Some(ActivityFields {
            payment_deadline: item.payment_deadline,
            gratis: item.common.gratis,
            blocked: item.common.blocked,
        }))
    }

    async fn find_reminder_candidates(
        &self,
        query: ReminderQuery,
    ) -> Result<Vec<SubscriptionItem>, StoreError> {
        let tables = self.lock();
        let mut candidates: Vec<SubscriptionItem> = tables
            .items
            .values()
            .filter_map(|item| item.as_subscription())
            .filter(|item| {
                item.trial == query.trial
                    && item.due_payment_date <= query.due_on_or_before
                    && item.common.reminders_sent < query.reminders_sent_below
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|item| item.common.id);
        Ok(candidates)
    }

    async fn cancel_active_subscription(&self, id: ItemId) -> Result<u32, StoreError> {
        let mut tables = self.lock();
        match tables.items.get_mut(&id) {
            Some(Item::Subscription(item)) => {
                item.active_subscription = None;
                item.subinvoice += 1;
                Ok(item.subinvoice)
            }
            _ => Err(StoreError::NotFound {
                kind: RecordKind::Item,
                id: id.value(),
            }),
        }
    }

    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self.lock().transactions.get(&id).cloned())
    }

    async fn save_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.lock()
            .transactions
            .insert(transaction.id(), transaction.clone());
        Ok(())
    }

    async fn get_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self.lock().subscriptions.get(&id).cloned())
    }

    async fn find_subscription_by_transaction(
        &self,
        transaction: TransactionId,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .lock()
            .subscriptions
            .values()
            .find(|s| s.transaction == transaction)
            .cloned())
    }

    async fn save_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        self.lock()
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn save_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        self.lock().payments.insert(payment.id, payment.clone());
        Ok(())
    }
}
