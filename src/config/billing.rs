//! Core billing configuration: realm and MAC key.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::billing::TransactionIdentity;

/// Realm and secret key for transaction identity encoding.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Namespace prefix distinguishing this deployment's transactions and
    /// invoices from others sharing a processor account.
    pub realm: String,

    /// HMAC key authenticating identity strings echoed back by processors.
    pub secret_key: SecretString,
}

impl BillingConfig {
    /// Build the identity codec from this configuration.
    pub fn identity(&self) -> TransactionIdentity {
        TransactionIdentity::new(self.realm.clone(), self.secret_key.clone())
    }

    /// Validate billing configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.realm.is_empty() {
            return Err(ValidationError::MissingRequired("PAYEE__BILLING__REALM"));
        }
        // The identity wire format is space-delimited; a realm with spaces
        // could never decode.
        if self.realm.contains(char::is_whitespace) {
            return Err(ValidationError::RealmContainsWhitespace);
        }
        if self.secret_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYEE__BILLING__SECRET_KEY",
            ));
        }
        Ok(())
    }
}
