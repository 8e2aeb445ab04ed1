//! In-memory adapters for the storage ports.
//!
//! Used by the test suites and local development runs.

mod customer_store;
mod payment_ledger;
mod subscription_repository;

pub use customer_store::InMemoryCustomerStore;
pub use payment_ledger::InMemoryPaymentLedger;
pub use subscription_repository::InMemorySubscriptionRepository;
