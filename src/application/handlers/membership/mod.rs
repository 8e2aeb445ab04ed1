//! Membership command and query handlers.

mod billing_portal;
mod check_active;
mod customer_identity;
mod get_subscription;
mod process_webhook_event;
mod run_reconciliation;
mod start_enrollment;

pub use billing_portal::BillingPortalHandler;
pub use check_active::CheckActiveHandler;
pub use customer_identity::CustomerIdentityMapper;
pub use get_subscription::GetSubscriptionHandler;
pub use process_webhook_event::{ProcessWebhookEventHandler, WebhookOutcome};
pub use run_reconciliation::RunReconciliationHandler;
pub use start_enrollment::{EnrollmentStarted, StartEnrollmentCommand, StartEnrollmentHandler};
