//! Outbound adapters implementing the ports.

pub mod memory;
