//! Payee - Subscription Billing Lifecycle Engine
//!
//! This crate implements the billing lifecycle for one-time and recurring
//! purchases: period arithmetic, payment due-date tracking, authenticated
//! processor callbacks, payment reminders, and subscription cancellation.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
