//! Stripe adapter - PaymentProvider implementation and webhook ingestion.

mod stripe_adapter;
mod webhook_types;
mod webhook_verifier;

pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_types::StripeWebhookEvent;
pub use webhook_verifier::WebhookVerifier;
