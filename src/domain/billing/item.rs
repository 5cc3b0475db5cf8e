//! Purchase items and the subscription date engine.
//!
//! An [`Item`] is the polymorphic purchase record: a one-time purchase
//! ([`SimpleItem`]), a recurring subscription ([`SubscriptionItem`]), or a
//! one-shot extension/refund of a subscription ([`ProlongItem`]). Shared
//! fields live in [`ItemCommon`], composed into each variant.
//!
//! The subscription date engine lives on [`SubscriptionItem`]:
//! [`SubscriptionItem::set_payment_date`] is the single writer of
//! `due_payment_date` and `payment_deadline`; trial start, renewal, refund,
//! and month-end correction all route through it.
//!
//! # Design Decisions
//!
//! - **Money in cents**: monetary values stored as i64 cents
//! - **Explicit clock**: every date computation takes `today` as a parameter
//! - **Tagged union**: variants are an enum, not an inheritance hierarchy

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ids::{ItemId, SubscriptionId};
use super::period::{day_needs_adjustment, Period};

/// Highest reminder tier already sent for an item. 0 means none.
pub mod reminder_watermark {
    /// No reminder sent this cycle.
    pub const NONE: u8 = 0;
    /// Deadline-passed reminder sent.
    pub const DEADLINE: u8 = 1;
    /// Due-date reminder sent.
    pub const DUE: u8 = 2;
    /// Before-due reminder sent.
    pub const BEFORE_DUE: u8 = 3;
}

/// Fields shared by every item variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCommon {
    pub id: ItemId,

    pub creation_date: NaiveDate,

    /// Product name. Products are reference data, name only.
    pub product: String,

    pub quantity: u32,

    /// ISO 4217 currency code.
    pub currency: String,

    /// Price of one payment, in cents. For subscriptions, the amount of one
    /// recurring charge.
    pub price_cents: i64,

    pub shipping_cents: i64,

    /// Product or service provided free of charge.
    pub gratis: bool,

    /// Fraud or abuse detected. Forces the item inactive regardless of
    /// payment state.
    pub blocked: bool,

    /// Highest reminder tier already sent this billing cycle (0-3).
    /// See [`reminder_watermark`].
    pub reminders_sent: u8,

    /// Subscription this item replaces (plan upgrade chain). Cleared
    /// automatically when the new subscription activates.
    pub old_subscription: Option<SubscriptionId>,
}

impl ItemCommon {
    pub fn new(
        id: ItemId,
        product: impl Into<String>,
        price_cents: i64,
        creation_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            creation_date,
            product: product.into(),
            quantity: 1,
            currency: "USD".to_string(),
            price_cents,
            shipping_cents: 0,
            gratis: false,
            blocked: false,
            reminders_sent: reminder_watermark::NONE,
            old_subscription: None,
        }
    }
}

/// A non-recurring purchase. Terminal once paid or gratis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleItem {
    pub common: ItemCommon,
    pub paid: bool,
}

impl SimpleItem {
    pub fn new(common: ItemCommon) -> Self {
        Self {
            common,
            paid: false,
        }
    }

    pub fn is_paid(&self) -> bool {
        (self.paid || self.common.gratis) && !self.common.blocked
    }
}

/// A recurring purchase with due dates, grace, and trial handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub common: ItemCommon,

    /// Currently active processor agreement, if any.
    pub active_subscription: Option<SubscriptionId>,

    /// Next date a payment is expected.
    pub due_payment_date: NaiveDate,

    /// Due date plus grace period. Unset until the first
    /// `set_payment_date`; the item is inactive while unset (unless gratis).
    pub payment_deadline: Option<NaiveDate>,

    pub last_payment: Option<NaiveDate>,

    /// Currently in a trial period.
    pub trial: bool,

    /// Extra time after the due date before the subscription lapses.
    pub grace_period: Period,

    /// Span between recurring charges.
    pub payment_period: Period,

    /// Initial period before the first real charge. May be zero-length.
    pub trial_period: Period,

    /// Monotonic counter disambiguating repeated billing cycles of one
    /// subscription for processor-side invoice uniqueness. Bumped on cancel.
    pub subinvoice: u32,
}

impl SubscriptionItem {
    pub fn new(common: ItemCommon) -> Self {
        let due_payment_date = common.creation_date;
        Self {
            common,
            active_subscription: None,
            due_payment_date,
            payment_deadline: None,
            last_payment: None,
            trial: false,
            grace_period: Period::days(20),
            payment_period: Period::months(1),
            trial_period: Period::months(0),
            subinvoice: 1,
        }
    }

    /// Whether the subscription currently grants service.
    ///
    /// Active iff the deadline is set and not passed, or the item is gratis.
    /// `blocked` forces inactive regardless of everything else.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        let prior = self
            .payment_deadline
            .map(|deadline| today <= deadline)
            .unwrap_or(false);
        (prior || self.common.gratis) && !self.common.blocked
    }

    /// Sets the due date and recomputes the deadline from the grace period.
    ///
    /// Single writer of both fields; every other mutation routes through
    /// here, keeping `payment_deadline >= due_payment_date`.
    ///
    /// Advancing the due date starts a new billing cycle, so the reminder
    /// watermark resets and the next sweep may notify again.
    pub fn set_payment_date(&mut self, date: NaiveDate) {
        if date > self.due_payment_date {
            self.common.reminders_sent = reminder_watermark::NONE;
        }
        self.due_payment_date = date;
        self.payment_deadline = Some(self.grace_period.to_delta().add_to(date));
    }

    /// Begins the trial: the first real charge falls due one trial period
    /// from today.
    pub fn start_trial(&mut self, today: NaiveDate) {
        self.trial = true;
        self.set_payment_date(self.trial_period.to_delta().add_to(today));
    }

    /// Derives the trial flag from the configured trial period and corrects
    /// month-end billing anchors. Called when the subscription activates.
    pub fn adjust(&mut self) {
        self.trial = !self.trial_period.is_zero();
        self.adjust_dates();
    }

    /// Month-end correction for the billing anchor.
    ///
    /// Anchoring a monthly charge on the 29th-31st produces inconsistent
    /// charge dates across months, so the due date is pushed forward
    /// day-by-day until it lands on the 1st. The subscriber gets the pushed
    /// days free.
    pub fn adjust_dates(&mut self) {
        let mut period_end = self
            .trial_period
            .to_delta()
            .add_to(self.common.creation_date);
        period_end = period_end.max(self.due_payment_date);
        if day_needs_adjustment(&self.trial_period, period_end) {
            self.do_adjust_dates(period_end);
        }
    }

    fn do_adjust_dates(&mut self, mut period_end: NaiveDate) {
        while period_end.day() != 1 {
            period_end = period_end
                .checked_add_days(Days::new(1))
                .unwrap_or(NaiveDate::MAX);
        }
        self.set_payment_date(period_end);
    }

    /// Signed days until the due date. Negative when already past due.
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        (self.due_payment_date - today).num_days()
    }
}

/// One-shot manual extension of a subscription. Refunding it rewinds the
/// parent's due date by the prolonged span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProlongItem {
    pub common: ItemCommon,

    /// The subscription item this record extends.
    pub parent: ItemId,

    /// Span the parent was extended by.
    pub prolong: Period,
}

impl ProlongItem {
    pub fn new(common: ItemCommon, parent: ItemId, prolong: Period) -> Self {
        Self {
            common,
            parent,
            prolong,
        }
    }

    /// Rewinds the parent's due date by the refunded span, recomputing the
    /// deadline through `set_payment_date`.
    pub fn refund(&self, parent: &mut SubscriptionItem) {
        let rewound = self.prolong.to_delta().sub_from(parent.due_payment_date);
        parent.set_payment_date(rewound);
    }
}

/// The polymorphic purchase record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Item {
    Simple(SimpleItem),
    Subscription(SubscriptionItem),
    Prolong(ProlongItem),
}

impl Item {
    pub fn id(&self) -> ItemId {
        self.common().id
    }

    pub fn common(&self) -> &ItemCommon {
        match self {
            Item::Simple(item) => &item.common,
            Item::Subscription(item) => &item.common,
            Item::Prolong(item) => &item.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut ItemCommon {
        match self {
            Item::Simple(item) => &mut item.common,
            Item::Subscription(item) => &mut item.common,
            Item::Prolong(item) => &mut item.common,
        }
    }

    pub fn is_subscription(&self) -> bool {
        matches!(self, Item::Subscription(_))
    }

    /// Post-activation adjustment. A no-op for non-recurring variants.
    pub fn adjust(&mut self) {
        if let Item::Subscription(item) = self {
            item.adjust();
        }
    }

    pub fn as_subscription(&self) -> Option<&SubscriptionItem> {
        match self {
            Item::Subscription(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_subscription_mut(&mut self) -> Option<&mut SubscriptionItem> {
        match self {
            Item::Subscription(item) => Some(item),
            _ => None,
        }
    }
}

/// Projection of the three fields that determine subscription activity.
///
/// Lets the store answer "is this item active?" without materializing the
/// whole record. Same contract as [`SubscriptionItem::is_active`], only
/// faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityFields {
    pub payment_deadline: Option<NaiveDate>,
    pub gratis: bool,
    pub blocked: bool,
}

impl ActivityFields {
    pub fn is_active(&self, today: NaiveDate) -> bool {
        let prior = self
            .payment_deadline
            .map(|deadline| today <= deadline)
            .unwrap_or(false);
        (prior || self.gratis) && !self.blocked
    }
}
