//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `membership` - Subscription lifecycle, payment ledger, webhook events

pub mod foundation;
pub mod membership;
