//! Billing periods and calendar-aware date arithmetic.
//!
//! A [`Period`] is a semantic duration (count of days, weeks, months, or
//! years). Days and weeks are fixed-length; months and years are
//! calendar-relative: adding one month to Jan 31 lands on the last day of
//! February, not a fixed 30 days later. This matches how payment processors
//! define monthly billing cycles.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of a billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeriodUnit::Days => "days",
            PeriodUnit::Weeks => "weeks",
            PeriodUnit::Months => "months",
            PeriodUnit::Years => "years",
        };
        write!(f, "{}", s)
    }
}

/// A semantic duration used for payment, grace, trial, and prolong spans.
///
/// `count` may be 0, meaning "no period". Immutable value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub unit: PeriodUnit,
    pub count: u32,
}

impl Period {
    pub fn new(unit: PeriodUnit, count: u32) -> Self {
        Self { unit, count }
    }

    pub fn days(count: u32) -> Self {
        Self::new(PeriodUnit::Days, count)
    }

    pub fn weeks(count: u32) -> Self {
        Self::new(PeriodUnit::Weeks, count)
    }

    pub fn months(count: u32) -> Self {
        Self::new(PeriodUnit::Months, count)
    }

    pub fn years(count: u32) -> Self {
        Self::new(PeriodUnit::Years, count)
    }

    /// True when this period spans no time at all.
    pub fn is_zero(&self) -> bool {
        self.count == 0
    }

    /// Converts to a calendar delta. Weeks collapse to days, years to months.
    pub fn to_delta(&self) -> CalendarDelta {
        match self.unit {
            PeriodUnit::Days => CalendarDelta::Days(u64::from(self.count)),
            PeriodUnit::Weeks => CalendarDelta::Days(u64::from(self.count) * 7),
            PeriodUnit::Months => CalendarDelta::Months(self.count),
            PeriodUnit::Years => CalendarDelta::Months(self.count * 12),
        }
    }
}

impl fmt::Display for Period {
    /// Human-readable form used in notification payloads, e.g. "3 months".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.count, self.unit)
    }
}

/// Calendar-aware delta produced by [`Period::to_delta`].
///
/// Month arithmetic clamps to the end of the target month (Jan 31 + 1 month
/// is Feb 29 in a leap year, Feb 28 otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarDelta {
    Days(u64),
    Months(u32),
}

impl CalendarDelta {
    /// Applies the delta forward from `date`.
    pub fn add_to(&self, date: NaiveDate) -> NaiveDate {
        match *self {
            CalendarDelta::Days(n) => date
                .checked_add_days(Days::new(n))
                .unwrap_or(NaiveDate::MAX),
            CalendarDelta::Months(n) => date
                .checked_add_months(Months::new(n))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    /// Applies the delta backward from `date`. Used by refunds.
    pub fn sub_from(&self, date: NaiveDate) -> NaiveDate {
        match *self {
            CalendarDelta::Days(n) => date
                .checked_sub_days(Days::new(n))
                .unwrap_or(NaiveDate::MIN),
            CalendarDelta::Months(n) => date
                .checked_sub_months(Months::new(n))
                .unwrap_or(NaiveDate::MIN),
        }
    }
}

/// True when billing anchored on `date` would drift across month ends.
///
/// Billing a subscriber on the 29th-31st produces inconsistent charge dates
/// (February has no 30th). Such anchors get pushed to the 1st of the next
/// month by the date engine, giving the subscriber 1-3 extra free days.
pub fn day_needs_adjustment(period: &Period, date: NaiveDate) -> bool {
    match period.unit {
        PeriodUnit::Months => date.day() >= 29,
        PeriodUnit::Years => date.month() == 2 && date.day() == 29,
        _ => false,
    }
}
