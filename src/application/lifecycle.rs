//! Lifecycle service: cancellation, refunds, and processor callbacks.
//!
//! Orchestrates item and subscription state transitions over the store,
//! notifier, and processor ports. Callbacks locate their transaction through
//! the authenticated identity string; all date mutations route through the
//! domain date engine.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::{BillingConfig, UrlConfig};
use crate::domain::billing::{
    BillingError, Item, ItemId, Payment, PaymentId, PaymentKind, Subscription, SubscriptionId,
    SubscriptionItem, Transaction, TransactionId, TransactionIdentity,
};
use crate::ports::{BillingStore, NotificationSender, ProcessorRegistry, TemplateId};

/// A processor's payment-success notice, already transport-decoded.
///
/// Record ids are allocated by the caller (the callback adapter owns the id
/// sequence); the service only decides what the ids attach to.
#[derive(Debug, Clone)]
pub struct PaymentNotice {
    /// The identity string the processor echoed back.
    pub custom: String,

    /// Id for the payment record this notice creates.
    pub payment_id: PaymentId,

    /// Id to use if this notice creates a new subscription record.
    pub new_subscription_id: Option<SubscriptionId>,

    /// Agreement reference, present when the payer signed up for recurring
    /// charges.
    pub subscription_reference: Option<String>,

    /// Payer email reported by the processor.
    pub email: Option<String>,

    /// True for recurring charges against an existing agreement.
    pub automatic: bool,
}

/// Orchestrates billing lifecycle transitions.
pub struct LifecycleService {
    store: Arc<dyn BillingStore>,
    notifier: Arc<dyn NotificationSender>,
    processors: Arc<ProcessorRegistry>,
    identity: TransactionIdentity,
    realm: String,
    urls: UrlConfig,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn BillingStore>,
        notifier: Arc<dyn NotificationSender>,
        processors: Arc<ProcessorRegistry>,
        billing: &BillingConfig,
        urls: UrlConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            processors,
            identity: billing.identity(),
            realm: billing.realm.clone(),
            urls,
        }
    }

    /// Decode and authenticate an identity string from a callback.
    pub fn decode_identity(&self, custom: &str) -> Result<TransactionId, BillingError> {
        self.identity.decode(custom)
    }

    /// Encode the identity string for a transaction, for embedding in a
    /// checkout redirect.
    pub fn encode_identity(&self, transaction: TransactionId) -> String {
        self.identity.encode(transaction)
    }

    /// Whether a subscription item currently grants service.
    ///
    /// Fetches only the three determining fields; same contract as loading
    /// the item and asking it directly.
    pub async fn quick_is_active(
        &self,
        id: ItemId,
        today: NaiveDate,
    ) -> Result<bool, BillingError> {
        let fields = self
            .store
            .fetch_activity_fields(id)
            .await?
            .ok_or_else(|| BillingError::item_not_found(id))?;
        Ok(fields.is_active(today))
    }

    /// Cancel the active subscription on an item.
    ///
    /// The store clears `active_subscription` and bumps `subinvoice` in one
    /// atomic conditional update, so a concurrently arriving stale callback
    /// cannot resurrect the agreement. Returns the bumped subinvoice.
    ///
    /// Unless the item is itself a replacement in an upgrade chain, the
    /// subscriber is notified; a missing email or failed delivery is logged
    /// and does not undo the cancel.
    pub async fn cancel_subscription(
        &self,
        id: ItemId,
        today: NaiveDate,
    ) -> Result<u32, BillingError> {
        let item = self.load_subscription_item(id).await?;
        let detached_subscription = item.active_subscription;

        let subinvoice = self.store.cancel_active_subscription(id).await?;
        info!(item = %id, subinvoice, "subscription cancelled");

        // Plan upgrades replace the agreement; no subscriber-facing notice.
        if item.common.old_subscription.is_none() {
            self.send_cancel_notice(&item, detached_subscription, today)
                .await;
        }

        Ok(subinvoice)
    }

    async fn send_cancel_notice(
        &self,
        item: &SubscriptionItem,
        subscription: Option<SubscriptionId>,
        today: NaiveDate,
    ) {
        let Some(email) = self.subscription_email(subscription).await else {
            return;
        };

        let data = serde_json::json!({
            "product": item.common.product,
            "url": self.urls.prolong_url(item.common.id),
            "days_before": item.days_until_due(today),
        });
        let body = match self.notifier.render(TemplateId::SubscriptionCanceled, &data) {
            Ok(body) => body,
            Err(err) => {
                warn!(item = %item.common.id, %err, "cancel notice render failed");
                return;
            }
        };
        if let Err(err) = self
            .notifier
            .send("Service subscription canceled", &body, &email)
            .await
        {
            warn!(item = %item.common.id, %err, "cancel notice delivery failed");
        }
    }

    /// Cancel the agreement at the processor.
    ///
    /// Propagates processor failures unchanged; local records are only
    /// mutated later, by the processor's cancellation callback driving
    /// [`LifecycleService::cancel_subscription`].
    pub async fn force_cancel(
        &self,
        subscription: &Subscription,
        is_upgrade: bool,
    ) -> Result<(), BillingError> {
        let Some(reference) = subscription.subscription_reference.as_deref() else {
            return Ok(());
        };
        let api = self.processors.get(&subscription.processor)?;
        api.cancel_agreement(reference, is_upgrade)
            .await
            .map_err(|err| BillingError::processor(subscription.processor.as_str(), err.message))
    }

    /// Refund a prolong purchase: rewind the parent subscription's due date
    /// by the prolonged span.
    pub async fn refund_prolong(&self, id: ItemId) -> Result<(), BillingError> {
        let item = self
            .store
            .get_item(id)
            .await?
            .ok_or_else(|| BillingError::item_not_found(id))?;
        let Item::Prolong(prolong) = item else {
            return Err(BillingError::WrongItemKind(id, "prolong item"));
        };

        let mut parent = self.load_subscription_item(prolong.parent).await?;
        prolong.refund(&mut parent);
        self.store
            .save_item(&Item::Subscription(parent))
            .await
            .map_err(Into::into)
    }

    /// Begin a subscription item's trial and persist the computed dates.
    pub async fn start_trial(&self, id: ItemId, today: NaiveDate) -> Result<(), BillingError> {
        let mut item = self.load_subscription_item(id).await?;
        item.start_trial(today);
        self.store
            .save_item(&Item::Subscription(item))
            .await
            .map_err(Into::into)
    }

    /// Apply a payment-success notice from a processor callback.
    ///
    /// Locates the transaction through the authenticated identity, marks the
    /// item paid (simple) or advances its billing cycle (subscription),
    /// records the payment, and upserts the subscription agreement when a
    /// reference is present.
    pub async fn register_payment(
        &self,
        notice: PaymentNotice,
        today: NaiveDate,
    ) -> Result<TransactionId, BillingError> {
        let transaction_id = self.identity.decode(&notice.custom)?;
        let transaction = self
            .store
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| BillingError::transaction_not_found(transaction_id))?;
        let item_id = transaction.item();
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| BillingError::item_not_found(item_id))?;

        match item {
            Item::Simple(mut simple) => {
                simple.paid = true;
                self.store.save_item(&Item::Simple(simple)).await?;
            }
            Item::Subscription(mut sub_item) => {
                self.advance_billing_cycle(&mut sub_item, today);
                if notice.subscription_reference.is_some() {
                    let subscription = self
                        .upsert_subscription(&transaction, &notice)
                        .await?;
                    sub_item.active_subscription = Some(subscription.id);
                }
                self.store.save_item(&Item::Subscription(sub_item)).await?;
            }
            Item::Prolong(prolong) => {
                // Paying for a prolong extends the parent.
                let mut parent = self.load_subscription_item(prolong.parent).await?;
                let extended = prolong.prolong.to_delta().add_to(parent.due_payment_date);
                parent.set_payment_date(extended);
                self.store.save_item(&Item::Subscription(parent)).await?;
            }
        }

        let payment = Payment {
            id: notice.payment_id,
            transaction: transaction_id,
            kind: if notice.automatic {
                PaymentKind::Automatic
            } else {
                PaymentKind::Manual
            },
            email: notice.email.clone(),
        };
        self.store.save_payment(&payment).await?;
        info!(transaction = %transaction_id, automatic = notice.automatic, "payment registered");

        Ok(transaction_id)
    }

    /// A real charge ends any trial and moves the due date one payment
    /// period past the later of the old due date and today.
    fn advance_billing_cycle(&self, item: &mut SubscriptionItem, today: NaiveDate) {
        item.last_payment = Some(today);
        item.trial = false;
        let base = item.due_payment_date.max(today);
        item.set_payment_date(item.payment_period.to_delta().add_to(base));
        item.adjust_dates();
    }

    async fn upsert_subscription(
        &self,
        transaction: &Transaction,
        notice: &PaymentNotice,
    ) -> Result<Subscription, BillingError> {
        let existing = self
            .store
            .find_subscription_by_transaction(transaction.id())
            .await?;
        let mut subscription = match existing {
            Some(subscription) => subscription,
            None => {
                let id = notice.new_subscription_id.ok_or_else(|| {
                    BillingError::Store(
                        "payment notice creates a subscription but carries no id".to_string(),
                    )
                })?;
                Subscription {
                    id,
                    transaction: transaction.id(),
                    processor: transaction.processor().clone(),
                    subscription_reference: None,
                    email: None,
                }
            }
        };
        subscription.subscription_reference = notice.subscription_reference.clone();
        if notice.email.is_some() {
            subscription.email = notice.email.clone();
        }
        self.store.save_subscription(&subscription).await?;
        Ok(subscription)
    }

    /// Processor-facing invoice id for a transaction.
    ///
    /// Subscription invoices resolve the subinvoice through the
    /// `old_subscription` chain: an upgrade bills under the original
    /// transaction's item counter, keeping one invoice lineage per
    /// agreement, and carries a `-u` suffix.
    pub async fn invoice_id(&self, transaction: &Transaction) -> Result<String, BillingError> {
        match transaction {
            Transaction::Simple(tx) => Ok(tx.invoice_id(&self.realm)),
            Transaction::Subscription(tx) => {
                let item = self.load_subscription_item(tx.item).await?;
                let is_upgrade = item.common.old_subscription.is_some();
                let subinvoice = self.resolve_subinvoice(&item).await?;
                Ok(tx.invoice_id(&self.realm, subinvoice, is_upgrade))
            }
        }
    }

    /// Subinvoice of the invoiced item, chain-resolved like
    /// [`LifecycleService::invoice_id`].
    pub async fn subinvoice(&self, transaction: &Transaction) -> Result<u32, BillingError> {
        match transaction {
            Transaction::Simple(tx) => Ok(tx.subinvoice()),
            Transaction::Subscription(tx) => {
                let item = self.load_subscription_item(tx.item).await?;
                self.resolve_subinvoice(&item).await
            }
        }
    }

    async fn resolve_subinvoice(&self, item: &SubscriptionItem) -> Result<u32, BillingError> {
        let Some(old) = item.common.old_subscription else {
            return Ok(item.subinvoice);
        };
        let old_subscription = self
            .store
            .get_subscription(old)
            .await?
            .ok_or_else(|| BillingError::subscription_not_found(old))?;
        let origin_tx = self
            .store
            .get_transaction(old_subscription.transaction)
            .await?
            .ok_or_else(|| {
                BillingError::transaction_not_found(old_subscription.transaction)
            })?;
        let origin_item = self.load_subscription_item(origin_tx.item()).await?;
        Ok(origin_item.subinvoice)
    }

    async fn load_subscription_item(&self, id: ItemId) -> Result<SubscriptionItem, BillingError> {
        let item = self
            .store
            .get_item(id)
            .await?
            .ok_or_else(|| BillingError::item_not_found(id))?;
        match item {
            Item::Subscription(item) => Ok(item),
            _ => Err(BillingError::WrongItemKind(id, "subscription item")),
        }
    }

    async fn subscription_email(&self, id: Option<SubscriptionId>) -> Option<String> {
        let id = id?;
        match self.store.get_subscription(id).await {
            Ok(subscription) => subscription.and_then(|s| s.email),
            Err(err) => {
                warn!(subscription = %id, %err, "email lookup failed");
                None
            }
        }
    }
}
