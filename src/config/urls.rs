//! Subscriber-facing URL configuration.

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::billing::ItemId;

fn default_prolong_path() -> String {
    "/payments/prolong".to_string()
}

/// Base URL and paths for links embedded in notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlConfig {
    /// Public base URL of the payments host, no trailing slash.
    pub payment_host: String,

    /// Path of the prolong/renew view; the item id is appended.
    #[serde(default = "default_prolong_path")]
    pub prolong_path: String,
}

impl UrlConfig {
    /// Absolute URL where a subscriber can prolong the given item.
    pub fn prolong_url(&self, item: ItemId) -> String {
        format!("{}{}/{}", self.payment_host, self.prolong_path, item)
    }

    /// Validate URL configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.payment_host.is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYEE__URLS__PAYMENT_HOST",
            ));
        }
        if !self.payment_host.starts_with("http://") && !self.payment_host.starts_with("https://")
        {
            return Err(ValidationError::InvalidPaymentHost);
        }
        Ok(())
    }
}
