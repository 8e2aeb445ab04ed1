//! Ports - async trait contracts between the application and its adapters.

mod customer_store;
mod payment_ledger;
mod payment_provider;
mod subscription_repository;

pub use customer_store::{CustomerMapping, CustomerStore, InsertOutcome};
pub use payment_ledger::{AppendOutcome, PaymentLedger};
pub use payment_provider::{
    CheckoutSessionRef, PaymentError, PaymentErrorCode, PaymentProvider, PortalSession,
    ProviderCustomer,
};
pub use subscription_repository::SubscriptionRepository;
