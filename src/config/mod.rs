//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Values are read with the `PAYEE` prefix
//! and `__` (double underscore) separating nested keys.
//!
//! # Example
//!
//! ```no_run
//! use payee::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod billing;
mod error;
mod reminders;
mod urls;

pub use billing::BillingConfig;
pub use error::{ConfigError, ValidationError};
pub use reminders::ReminderConfig;
pub use urls::UrlConfig;

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Realm and MAC key for transaction identity encoding
    pub billing: BillingConfig,

    /// Reminder lead times
    #[serde(default)]
    pub reminders: ReminderConfig,

    /// Subscriber-facing URLs
    pub urls: UrlConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Environment Variable Format
    ///
    /// - `PAYEE__BILLING__REALM=ACME` -> `billing.realm = "ACME"`
    /// - `PAYEE__REMINDERS__DAYS_BEFORE_DUE=7` -> `reminders.days_before_due = 7`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PAYEE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.billing.validate()?;
        self.reminders.validate()?;
        self.urls.validate()?;
        Ok(())
    }
}
