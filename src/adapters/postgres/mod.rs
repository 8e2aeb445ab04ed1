//! PostgreSQL adapters - persistent implementations of the storage ports.

mod customer_store;
mod payment_ledger;
mod subscription_repository;

pub use customer_store::PostgresCustomerStore;
pub use payment_ledger::PostgresPaymentLedger;
pub use subscription_repository::PostgresSubscriptionRepository;
