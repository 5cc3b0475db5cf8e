//! Payment processor API port and capability registry.
//!
//! Each processor exposes an API capability object. Capabilities are
//! registered under their [`ProcessorId`] at startup and resolved from the
//! registry at call time; there is no reflective lookup by stored model
//! names.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::billing::{BillingError, ProcessorId};

/// Failure calling out to a processor API.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProcessorApiError {
    pub message: String,
    /// Whether retrying the call might succeed.
    pub retryable: bool,
}

impl ProcessorApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}

/// Port for a single processor's API.
#[async_trait]
pub trait ProcessorApi: Send + Sync {
    /// Cancel a recurring-payment agreement at the processor.
    ///
    /// `is_upgrade` marks cancels that are part of a plan change, so the
    /// processor side can suppress subscriber-facing cancellation notices.
    async fn cancel_agreement(
        &self,
        reference: &str,
        is_upgrade: bool,
    ) -> Result<(), ProcessorApiError>;
}

impl std::fmt::Debug for dyn ProcessorApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ProcessorApi")
    }
}

/// Startup-built map from processor id to API capability.
#[derive(Default)]
pub struct ProcessorRegistry {
    apis: HashMap<ProcessorId, Arc<dyn ProcessorApi>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. Later registrations replace earlier ones.
    pub fn register(mut self, id: ProcessorId, api: Arc<dyn ProcessorApi>) -> Self {
        self.apis.insert(id, api);
        self
    }

    /// Resolve the capability for a processor.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::ProcessorError`] when no capability was
    /// registered for the id; an unregistered processor is a deployment
    /// configuration defect, not a caller bug.
    pub fn get(&self, id: &ProcessorId) -> Result<Arc<dyn ProcessorApi>, BillingError> {
        self.apis
            .get(id)
            .cloned()
            .ok_or_else(|| BillingError::processor(id.as_str(), "no API capability registered"))
    }
}
