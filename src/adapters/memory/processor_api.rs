//! Recording processor API.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{ProcessorApi, ProcessorApiError};

/// One cancellation request captured by [`RecordingProcessorApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRequest {
    pub reference: String,
    pub is_upgrade: bool,
}

/// [`ProcessorApi`] that records agreement cancellations in memory.
#[derive(Default)]
pub struct RecordingProcessorApi {
    cancels: Mutex<Vec<CancelRequest>>,
    failure: Mutex<Option<ProcessorApiError>>,
}

impl RecordingProcessorApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `cancel_agreement` fail with `error`.
    pub fn fail_with(&self, error: ProcessorApiError) {
        *self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(error);
    }

    /// Cancellations recorded so far.
    pub fn cancels(&self) -> Vec<CancelRequest> {
        self.cancels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ProcessorApi for RecordingProcessorApi {
    async fn cancel_agreement(
        &self,
        reference: &str,
        is_upgrade: bool,
    ) -> Result<(), ProcessorApiError> {
        if let Some(error) = self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
        {
            return Err(error);
        }
        self.cancels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(CancelRequest {
                reference: reference.to_string(),
                is_upgrade,
            });
        Ok(())
    }
}
