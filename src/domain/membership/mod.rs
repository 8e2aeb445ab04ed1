//! Membership domain - subscription lifecycle and payment reconciliation.

mod aggregate;
mod errors;
mod payment;
mod provider_event;
mod reconciliation;
mod status;
mod webhook_errors;

pub use aggregate::{Subscription, Transition};
pub use errors::MembershipError;
pub use payment::{Payment, PaymentStatus};
pub use provider_event::{PaymentNotice, ProviderEvent, ProviderEventKind};
pub use reconciliation::{decide_sweep_action, SweepAction, SweepSummary};
pub use status::SubscriptionStatus;
pub use webhook_errors::WebhookError;
