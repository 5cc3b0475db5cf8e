//! Reminder scheduler: idempotent sweep over due subscription items.
//!
//! A periodic driver (cron-like, external) invokes [`ReminderScheduler::
//! send_reminders`] once per sweep; the driver guarantees sweeps do not
//! overlap. Each sweep sends at most one reminder per item: the most
//! advanced tier the item is eligible for.
//!
//! Dispatch is record-then-send: the watermark is persisted before the
//! external delivery attempt, so a failed send is not retried within the
//! run. At-most-once per run beats duplicate billing-reminder spam.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use crate::config::{ReminderConfig, UrlConfig};
use crate::domain::billing::{reminder_watermark, Item, SubscriptionItem};
use crate::ports::{BillingStore, NotificationSender, ReminderQuery, StoreError, TemplateId};

/// Reminder tiers, most advanced first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReminderTier {
    /// Grace deadline has passed.
    Deadline,
    /// Due today or overdue.
    Due,
    /// Due within the configured lead time.
    BeforeDue,
}

impl ReminderTier {
    /// Watermark value recorded after sending this tier.
    fn watermark(self) -> u8 {
        match self {
            ReminderTier::Deadline => reminder_watermark::DEADLINE,
            ReminderTier::Due => reminder_watermark::DUE,
            ReminderTier::BeforeDue => reminder_watermark::BEFORE_DUE,
        }
    }

    fn template(self) -> TemplateId {
        match self {
            ReminderTier::Deadline => TemplateId::DeadlineReminder,
            ReminderTier::Due => TemplateId::DueReminder,
            ReminderTier::BeforeDue => TemplateId::BeforeDueReminder,
        }
    }
}

/// Outcome counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Candidates examined across both classes.
    pub examined: usize,
    /// Reminders handed to the notification sender.
    pub sent: usize,
    /// Items whose watermark advanced but had no resolvable recipient.
    pub skipped_no_email: usize,
    /// Deliveries that failed after the watermark was recorded.
    pub failed_sends: usize,
}

impl SweepStats {
    fn merge(self, other: SweepStats) -> SweepStats {
        SweepStats {
            examined: self.examined + other.examined,
            sent: self.sent + other.sent,
            skipped_no_email: self.skipped_no_email + other.skipped_no_email,
            failed_sends: self.failed_sends + other.failed_sends,
        }
    }
}

/// Sweeps subscription items and dispatches payment reminders.
pub struct ReminderScheduler {
    store: Arc<dyn BillingStore>,
    notifier: Arc<dyn NotificationSender>,
    config: ReminderConfig,
    urls: UrlConfig,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        notifier: Arc<dyn NotificationSender>,
        config: ReminderConfig,
        urls: UrlConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            urls,
        }
    }

    /// Run one sweep: regular items, then trial items.
    ///
    /// Only a failed candidate query aborts the sweep; every per-item
    /// failure is logged and isolated.
    pub async fn send_reminders(&self, today: NaiveDate) -> Result<SweepStats, StoreError> {
        let regular = self
            .sweep_class(today, false, self.config.days_before_due)
            .await?;
        let trial = self
            .sweep_class(today, true, self.config.days_before_trial_end)
            .await?;
        let stats = regular.merge(trial);
        info!(
            examined = stats.examined,
            sent = stats.sent,
            skipped_no_email = stats.skipped_no_email,
            failed_sends = stats.failed_sends,
            "reminder sweep finished"
        );
        Ok(stats)
    }

    async fn sweep_class(
        &self,
        today: NaiveDate,
        trial: bool,
        lead_days: u32,
    ) -> Result<SweepStats, StoreError> {
        let horizon = today
            .checked_add_days(Days::new(u64::from(lead_days)))
            .unwrap_or(NaiveDate::MAX);
        // One query covers all three tiers: deadline-eligible items are a
        // subset of due-eligible ones, which are a subset of this horizon.
        let candidates = self
            .store
            .find_reminder_candidates(ReminderQuery {
                trial,
                due_on_or_before: horizon,
                reminders_sent_below: reminder_watermark::BEFORE_DUE,
            })
            .await?;

        let mut stats = SweepStats::default();
        for item in candidates {
            stats.examined += 1;
            if item.common.blocked {
                continue;
            }
            let Some(tier) = self.eligible_tier(&item, today, horizon) else {
                continue;
            };
            self.dispatch(item, tier, today, lead_days, &mut stats).await;
        }
        Ok(stats)
    }

    /// Most advanced tier the item is eligible for, or `None`.
    ///
    /// Checking deadline before due before before-due bounds each item to
    /// one reminder per run. The watermark gates then bound it to one
    /// reminder per billing cycle: any recorded watermark fails every
    /// gate, until a renewal advances the due date and resets it.
    fn eligible_tier(
        &self,
        item: &SubscriptionItem,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Option<ReminderTier> {
        let watermark = item.common.reminders_sent;
        if watermark < reminder_watermark::DEADLINE
            && item.payment_deadline.map(|d| d <= today).unwrap_or(false)
        {
            return Some(ReminderTier::Deadline);
        }
        if watermark < reminder_watermark::DUE && item.due_payment_date <= today {
            return Some(ReminderTier::Due);
        }
        // Strictly future: an overdue item is never "due soon" again.
        if watermark < reminder_watermark::BEFORE_DUE
            && item.due_payment_date > today
            && item.due_payment_date <= horizon
        {
            return Some(ReminderTier::BeforeDue);
        }
        None
    }

    async fn dispatch(
        &self,
        mut item: SubscriptionItem,
        tier: ReminderTier,
        today: NaiveDate,
        lead_days: u32,
        stats: &mut SweepStats,
    ) {
        let item_id = item.common.id;

        // Record before send: if the watermark cannot be persisted, the
        // reminder is not sent either, or the next sweep would duplicate it.
        item.common.reminders_sent = tier.watermark();
        let subscription = item.active_subscription;
        let product = item.common.product.clone();
        let mut data = serde_json::json!({
            "product": product,
            "url": self.urls.prolong_url(item_id),
        });
        if tier == ReminderTier::BeforeDue {
            data["days_before"] = serde_json::json!(lead_days);
        }
        if let Err(err) = self.store.save_item(&Item::Subscription(item)).await {
            warn!(item = %item_id, %err, "watermark save failed, reminder withheld");
            return;
        }

        let email = match subscription {
            Some(id) => match self.store.get_subscription(id).await {
                Ok(subscription) => subscription.and_then(|s| s.email),
                Err(err) => {
                    warn!(item = %item_id, %err, "recipient lookup failed");
                    None
                }
            },
            None => None,
        };
        let Some(email) = email else {
            // Expected for items that never activated an agreement.
            debug!(item = %item_id, "no recipient, reminder skipped");
            stats.skipped_no_email += 1;
            return;
        };

        let body = match self.notifier.render(tier.template(), &data) {
            Ok(body) => body,
            Err(err) => {
                warn!(item = %item_id, ?tier, %err, "reminder render failed");
                stats.failed_sends += 1;
                return;
            }
        };
        let subject = format!("You need to pay for {}", product);
        match self.notifier.send(&subject, &body, &email).await {
            Ok(()) => {
                debug!(item = %item_id, ?tier, date = %today, "reminder sent");
                stats.sent += 1;
            }
            Err(err) => {
                // Not retried this run; the watermark already advanced.
                warn!(item = %item_id, ?tier, %err, "reminder delivery failed");
                stats.failed_sends += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryBillingStore, RecordingNotifier};
    use crate::domain::billing::{Item, ItemCommon, ItemId, ProcessorId, Subscription, SubscriptionId, TransactionId};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const TODAY: fn() -> NaiveDate = || date(2024, 6, 15);

    struct Fixture {
        store: Arc<InMemoryBillingStore>,
        notifier: Arc<RecordingNotifier>,
        scheduler: ReminderScheduler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryBillingStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = ReminderScheduler::new(
            store.clone(),
            notifier.clone(),
            ReminderConfig::default(),
            UrlConfig {
                payment_host: "https://pay.example.com".to_string(),
                prolong_path: "/payments/prolong".to_string(),
            },
        );
        Fixture {
            store,
            notifier,
            scheduler,
        }
    }

    /// Item due on `due`, linked to an agreement with a deliverable email.
    async fn seed_item(fx: &Fixture, id: u64, due: NaiveDate) -> SubscriptionItem {
        let mut item = SubscriptionItem::new(ItemCommon::new(
            ItemId::new(id),
            "vpn-plan",
            999,
            date(2024, 1, 1),
        ));
        item.set_payment_date(due);
        item.active_subscription = Some(SubscriptionId::new(id));
        fx.store
            .save_item(&Item::Subscription(item.clone()))
            .await
            .unwrap();
        fx.store
            .save_subscription(&Subscription {
                id: SubscriptionId::new(id),
                transaction: TransactionId::new(id),
                processor: ProcessorId::new("paypal"),
                subscription_reference: Some(format!("agr-{}", id)),
                email: Some(format!("payer{}@example.com", id)),
            })
            .await
            .unwrap();
        item
    }

    async fn stored_watermark(fx: &Fixture, id: u64) -> u8 {
        fx.store
            .get_item(ItemId::new(id))
            .await
            .unwrap()
            .unwrap()
            .common()
            .reminders_sent
    }

    #[tokio::test]
    async fn upcoming_due_gets_before_due_reminder() {
        let fx = fixture();
        let today = TODAY();
        seed_item(&fx, 1, date(2024, 6, 20)).await;

        let stats = fx.scheduler.send_reminders(today).await.unwrap();
        assert_eq!(stats.sent, 1);

        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.starts_with("BeforeDueReminder:"));
        assert!(sent[0].body.contains("\"days_before\":7"));
        assert!(sent[0]
            .body
            .contains("https://pay.example.com/payments/prolong/1"));
        assert_eq!(sent[0].to, "payer1@example.com");
        assert_eq!(stored_watermark(&fx, 1).await, reminder_watermark::BEFORE_DUE);
    }

    #[tokio::test]
    async fn due_today_gets_due_reminder() {
        let fx = fixture();
        let today = TODAY();
        seed_item(&fx, 1, today).await;

        fx.scheduler.send_reminders(today).await.unwrap();

        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.starts_with("DueReminder:"));
        assert_eq!(stored_watermark(&fx, 1).await, reminder_watermark::DUE);
    }

    #[tokio::test]
    async fn deadline_wins_when_item_is_past_both_dates() {
        let fx = fixture();
        let today = TODAY();
        // Due 25 days ago; the 20-day grace deadline passed 5 days ago.
        seed_item(&fx, 1, date(2024, 5, 21)).await;

        let stats = fx.scheduler.send_reminders(today).await.unwrap();
        assert_eq!(stats.sent, 1);

        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.starts_with("DeadlineReminder:"));
        assert_eq!(stored_watermark(&fx, 1).await, reminder_watermark::DEADLINE);
    }

    #[tokio::test]
    async fn repeated_sweeps_send_nothing_new() {
        let fx = fixture();
        let today = TODAY();
        seed_item(&fx, 1, date(2024, 6, 20)).await;

        fx.scheduler.send_reminders(today).await.unwrap();
        let second = fx.scheduler.send_reminders(today).await.unwrap();

        assert_eq!(second.sent, 0);
        assert_eq!(fx.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn overdue_item_never_regresses_to_before_due() {
        let fx = fixture();
        // Due reminder already went out; the item is still overdue and
        // inside the lead window.
        let mut item = seed_item(&fx, 1, date(2024, 6, 14)).await;
        item.common.reminders_sent = reminder_watermark::DUE;
        fx.store
            .save_item(&Item::Subscription(item))
            .await
            .unwrap();

        let stats = fx.scheduler.send_reminders(TODAY()).await.unwrap();
        assert_eq!(stats.sent, 0);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn blocked_items_are_skipped() {
        let fx = fixture();
        let mut item = seed_item(&fx, 1, date(2024, 6, 20)).await;
        item.common.blocked = true;
        fx.store
            .save_item(&Item::Subscription(item))
            .await
            .unwrap();

        let stats = fx.scheduler.send_reminders(TODAY()).await.unwrap();
        assert_eq!(stats.sent, 0);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_recipient_advances_watermark_without_delivery() {
        let fx = fixture();
        let mut item = seed_item(&fx, 1, date(2024, 6, 20)).await;
        item.active_subscription = None;
        fx.store
            .save_item(&Item::Subscription(item))
            .await
            .unwrap();

        let stats = fx.scheduler.send_reminders(TODAY()).await.unwrap();
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.skipped_no_email, 1);
        assert!(fx.notifier.sent().is_empty());
        assert_eq!(stored_watermark(&fx, 1).await, reminder_watermark::BEFORE_DUE);
    }

    #[tokio::test]
    async fn failed_delivery_is_isolated_and_not_retried() {
        let fx = fixture();
        let today = TODAY();
        seed_item(&fx, 1, date(2024, 6, 20)).await;
        seed_item(&fx, 2, date(2024, 6, 20)).await;
        fx.notifier.fail_sends(true);

        let stats = fx.scheduler.send_reminders(today).await.unwrap();
        assert_eq!(stats.examined, 2);
        assert_eq!(stats.failed_sends, 2);
        assert_eq!(stats.sent, 0);
        assert_eq!(stored_watermark(&fx, 1).await, reminder_watermark::BEFORE_DUE);

        // Record-then-send: the failed reminder is not retried next sweep.
        fx.notifier.fail_sends(false);
        let second = fx.scheduler.send_reminders(today).await.unwrap();
        assert_eq!(second.sent, 0);
    }

    #[tokio::test]
    async fn trial_items_use_the_trial_lead_time() {
        let fx = fixture();
        let today = TODAY();
        // Due in 5 days: inside the 7-day regular lead, outside the 3-day
        // trial lead.
        let mut item = seed_item(&fx, 1, date(2024, 6, 20)).await;
        item.trial = true;
        fx.store
            .save_item(&Item::Subscription(item.clone()))
            .await
            .unwrap();

        let stats = fx.scheduler.send_reminders(today).await.unwrap();
        assert_eq!(stats.sent, 0);

        // Two days out it enters the trial window.
        let stats = fx.scheduler.send_reminders(date(2024, 6, 18)).await.unwrap();
        assert_eq!(stats.sent, 1);
        let sent = fx.notifier.sent();
        assert!(sent[0].body.contains("\"days_before\":3"));
    }

    #[tokio::test]
    async fn classes_are_swept_independently() {
        let fx = fixture();
        let today = TODAY();
        seed_item(&fx, 1, date(2024, 6, 20)).await;
        let mut trial = seed_item(&fx, 2, date(2024, 6, 16)).await;
        trial.trial = true;
        fx.store
            .save_item(&Item::Subscription(trial))
            .await
            .unwrap();

        let stats = fx.scheduler.send_reminders(today).await.unwrap();
        assert_eq!(stats.examined, 2);
        assert_eq!(stats.sent, 2);
    }
}
