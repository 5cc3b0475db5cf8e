//! Reminder lead-time configuration.

use serde::Deserialize;

use super::error::ValidationError;

fn default_days_before_due() -> u32 {
    7
}

fn default_days_before_trial_end() -> u32 {
    3
}

/// Lead times for before-due reminders, in days.
///
/// Regular and trial subscriptions carry separate lead times: trial-end
/// notices typically go out closer to the date.
#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    /// Days before the due date to remind regular subscribers.
    #[serde(default = "default_days_before_due")]
    pub days_before_due: u32,

    /// Days before the trial end to remind trial subscribers.
    #[serde(default = "default_days_before_trial_end")]
    pub days_before_trial_end: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            days_before_due: default_days_before_due(),
            days_before_trial_end: default_days_before_trial_end(),
        }
    }
}

impl ReminderConfig {
    /// Validate reminder configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        // A lead time of several months would flood subscribers the moment
        // a due date is set.
        if self.days_before_due > 90 || self.days_before_trial_end > 90 {
            return Err(ValidationError::ReminderLeadTooLong);
        }
        Ok(())
    }
}
