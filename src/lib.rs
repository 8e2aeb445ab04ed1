//! Association Membership - Subscription Lifecycle & Payment Reconciliation
//!
//! This crate tracks a user's paid-membership state, ingests asynchronous
//! payment-provider webhook events, and periodically self-heals state drift
//! by re-deriving subscription status from the payment ledger.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
