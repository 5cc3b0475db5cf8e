//! Integration tests for the billing lifecycle.
//!
//! These tests verify the end-to-end flow:
//! 1. A checkout transaction is created and its identity string issued
//! 2. The processor's payment callback advances the billing cycle
//! 3. Reminder sweeps escalate as the due date approaches and passes
//! 4. Cancellation detaches the agreement and notifies the subscriber
//!
//! Uses the in-memory adapters to exercise the services without external
//! dependencies.

use std::sync::Arc;

use chrono::NaiveDate;
use secrecy::SecretString;

use payee::adapters::memory::{InMemoryBillingStore, RecordingNotifier, RecordingProcessorApi};
use payee::application::{LifecycleService, PaymentNotice, ReminderScheduler};
use payee::config::{BillingConfig, ReminderConfig, UrlConfig};
use payee::domain::billing::{
    Item, ItemCommon, ItemId, PaymentId, ProcessorId, SubscriptionId, SubscriptionItem,
    SubscriptionTransaction, Transaction, TransactionId,
};
use payee::ports::{BillingStore, ProcessorRegistry};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct World {
    store: Arc<InMemoryBillingStore>,
    notifier: Arc<RecordingNotifier>,
    processor_api: Arc<RecordingProcessorApi>,
    lifecycle: LifecycleService,
    scheduler: ReminderScheduler,
}

fn world() -> World {
    let store = Arc::new(InMemoryBillingStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let processor_api = Arc::new(RecordingProcessorApi::new());
    let registry =
        ProcessorRegistry::new().register(ProcessorId::new("paypal"), processor_api.clone());
    let billing = BillingConfig {
        realm: "ACME".to_string(),
        secret_key: SecretString::new("integration-key".to_string()),
    };
    let urls = UrlConfig {
        payment_host: "https://pay.example.com".to_string(),
        prolong_path: "/payments/prolong".to_string(),
    };
    let lifecycle = LifecycleService::new(
        store.clone(),
        notifier.clone(),
        Arc::new(registry),
        &billing,
        urls.clone(),
    );
    let scheduler = ReminderScheduler::new(
        store.clone(),
        notifier.clone(),
        ReminderConfig::default(),
        urls,
    );
    World {
        store,
        notifier,
        processor_api,
        lifecycle,
        scheduler,
    }
}

/// Seed a monthly subscription item with its checkout transaction.
async fn seed_checkout(world: &World, item_id: u64, tx_id: u64, created: NaiveDate) {
    let mut item = SubscriptionItem::new(ItemCommon::new(
        ItemId::new(item_id),
        "vpn-plan",
        999,
        created,
    ));
    item.set_payment_date(created);
    world
        .store
        .save_item(&Item::Subscription(item))
        .await
        .unwrap();
    world
        .store
        .save_transaction(&Transaction::Subscription(SubscriptionTransaction {
            id: TransactionId::new(tx_id),
            processor: ProcessorId::new("paypal"),
            creation_date: created,
            item: ItemId::new(item_id),
        }))
        .await
        .unwrap();
}

#[tokio::test]
async fn payment_reminders_and_cancellation_flow() {
    let world = world();
    let created = date(2024, 1, 10);
    seed_checkout(&world, 1, 100, created).await;

    // Processor callback: first manual payment, agreement established.
    let custom = world.lifecycle.encode_identity(TransactionId::new(100));
    world
        .lifecycle
        .register_payment(
            PaymentNotice {
                custom,
                payment_id: PaymentId::new(1),
                new_subscription_id: Some(SubscriptionId::new(10)),
                subscription_reference: Some("agr-1".to_string()),
                email: Some("payer@example.com".to_string()),
                automatic: false,
            },
            created,
        )
        .await
        .unwrap();

    let item = world.store.get_item(ItemId::new(1)).await.unwrap().unwrap();
    let item = item.as_subscription().unwrap().clone();
    assert_eq!(item.due_payment_date, date(2024, 2, 10));
    assert_eq!(item.active_subscription, Some(SubscriptionId::new(10)));
    assert!(world
        .lifecycle
        .quick_is_active(ItemId::new(1), date(2024, 1, 20))
        .await
        .unwrap());

    // Nothing goes out ahead of the lead window.
    let quiet = world.scheduler.send_reminders(date(2024, 1, 20)).await.unwrap();
    assert_eq!(quiet.sent, 0);

    // Inside the window the before-due reminder fires.
    let before = world.scheduler.send_reminders(date(2024, 2, 5)).await.unwrap();
    assert_eq!(before.sent, 1);

    // One reminder per billing cycle: the watermark gates keep later
    // sweeps quiet until a renewal resets it.
    let due = world.scheduler.send_reminders(date(2024, 2, 10)).await.unwrap();
    assert_eq!(due.sent, 0);
    let deadline = world.scheduler.send_reminders(date(2024, 3, 2)).await.unwrap();
    assert_eq!(deadline.sent, 0);

    let bodies: Vec<String> = world.notifier.sent().into_iter().map(|m| m.body).collect();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].starts_with("BeforeDueReminder:"));

    // Past the deadline the item no longer grants service.
    assert!(!world
        .lifecycle
        .quick_is_active(ItemId::new(1), date(2024, 3, 2))
        .await
        .unwrap());

    // Cancel: agreement detached, counter bumped, subscriber notified.
    let subinvoice = world
        .lifecycle
        .cancel_subscription(ItemId::new(1), date(2024, 3, 2))
        .await
        .unwrap();
    assert_eq!(subinvoice, 2);

    let sent = world.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].to, "payer@example.com");
    assert!(sent[1].body.starts_with("SubscriptionCanceled:"));
}

#[tokio::test]
async fn item_missed_by_earlier_sweeps_gets_the_deadline_notice() {
    let world = world();
    let created = date(2024, 1, 10);
    seed_checkout(&world, 1, 100, created).await;

    let custom = world.lifecycle.encode_identity(TransactionId::new(100));
    world
        .lifecycle
        .register_payment(
            PaymentNotice {
                custom,
                payment_id: PaymentId::new(1),
                new_subscription_id: Some(SubscriptionId::new(10)),
                subscription_reference: Some("agr-1".to_string()),
                email: Some("payer@example.com".to_string()),
                automatic: false,
            },
            created,
        )
        .await
        .unwrap();

    // Due 2024-02-10, deadline 2024-03-01. The first sweep only happens
    // after the deadline; the item gets the deadline notice directly.
    let stats = world.scheduler.send_reminders(date(2024, 3, 2)).await.unwrap();
    assert_eq!(stats.sent, 1);
    let sent = world.notifier.sent();
    assert!(sent[0].body.starts_with("DeadlineReminder:"));
}

#[tokio::test]
async fn recurring_charge_resets_the_reminder_cycle() {
    let world = world();
    let created = date(2024, 1, 10);
    seed_checkout(&world, 1, 100, created).await;

    let custom = world.lifecycle.encode_identity(TransactionId::new(100));
    let notice = |payment: u64| PaymentNotice {
        custom: custom.clone(),
        payment_id: PaymentId::new(payment),
        new_subscription_id: Some(SubscriptionId::new(10)),
        subscription_reference: Some("agr-1".to_string()),
        email: Some("payer@example.com".to_string()),
        automatic: payment > 1,
    };
    world
        .lifecycle
        .register_payment(notice(1), created)
        .await
        .unwrap();

    // Before-due reminder for the first cycle.
    let first = world.scheduler.send_reminders(date(2024, 2, 5)).await.unwrap();
    assert_eq!(first.sent, 1);

    // The agreement charges automatically on the due date; the cycle
    // advances and the watermark resets.
    world
        .lifecycle
        .register_payment(notice(2), date(2024, 2, 10))
        .await
        .unwrap();

    let item = world.store.get_item(ItemId::new(1)).await.unwrap().unwrap();
    let item = item.as_subscription().unwrap().clone();
    assert_eq!(item.due_payment_date, date(2024, 3, 10));
    assert_eq!(item.common.reminders_sent, 0);

    // The next cycle reminds again.
    let second = world.scheduler.send_reminders(date(2024, 3, 5)).await.unwrap();
    assert_eq!(second.sent, 1);
}

#[tokio::test]
async fn upgrade_cancels_quietly_at_the_processor_and_locally() {
    let world = world();
    let created = date(2024, 1, 10);
    seed_checkout(&world, 1, 100, created).await;

    let custom = world.lifecycle.encode_identity(TransactionId::new(100));
    world
        .lifecycle
        .register_payment(
            PaymentNotice {
                custom,
                payment_id: PaymentId::new(1),
                new_subscription_id: Some(SubscriptionId::new(10)),
                subscription_reference: Some("agr-1".to_string()),
                email: Some("payer@example.com".to_string()),
                automatic: false,
            },
            created,
        )
        .await
        .unwrap();

    // Replacement item for the upgraded plan points back at the old
    // agreement.
    let mut replacement = SubscriptionItem::new(ItemCommon::new(
        ItemId::new(2),
        "vpn-plan-pro",
        1999,
        date(2024, 2, 1),
    ));
    replacement.common.old_subscription = Some(SubscriptionId::new(10));
    world
        .store
        .save_item(&Item::Subscription(replacement))
        .await
        .unwrap();

    // The old agreement is cancelled at the processor as part of the
    // upgrade.
    let old = world
        .store
        .get_subscription(SubscriptionId::new(10))
        .await
        .unwrap()
        .unwrap();
    world.lifecycle.force_cancel(&old, true).await.unwrap();
    let cancels = world.processor_api.cancels();
    assert_eq!(cancels.len(), 1);
    assert!(cancels[0].is_upgrade);

    // The processor's cancellation callback lands on the replacement item;
    // no subscriber-facing notice for an upgrade.
    let sent_before = world.notifier.sent().len();
    world
        .lifecycle
        .cancel_subscription(ItemId::new(2), date(2024, 2, 1))
        .await
        .unwrap();
    assert_eq!(world.notifier.sent().len(), sent_before);
}
