//! In-memory adapters.
//!
//! Full implementations of the outbound ports backed by process memory.
//! They drive the test suites and small single-process deployments; wire
//! adapters for a real database, mail gateway, and processor HTTP APIs
//! slot in behind the same ports.

mod billing_store;
mod notifier;
mod processor_api;

pub use billing_store::InMemoryBillingStore;
pub use notifier::{RecordingNotifier, SentMessage};
pub use processor_api::{CancelRequest, RecordingProcessorApi};
