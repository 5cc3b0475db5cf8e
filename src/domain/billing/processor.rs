//! Payment processor reference data.
//!
//! Processors are read-mostly records. Each carries a [`ProcessorId`], the
//! key under which its API capability is registered at startup; nothing is
//! resolved reflectively at call time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry key identifying a payment processor's API capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessorId(String);

impl ProcessorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payment processor this deployment can redirect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProcessor {
    pub id: ProcessorId,

    /// Display name.
    pub name: String,

    /// Checkout endpoint base URL.
    pub url: String,
}
