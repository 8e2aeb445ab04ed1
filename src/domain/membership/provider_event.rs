//! Provider event model.
//!
//! The engine consumes a closed set of payment-provider notifications.
//! The raw transport payload is verified and translated into this model by
//! the provider adapter before the processor ever sees it.

use crate::domain::foundation::Timestamp;
use serde::{Deserialize, Serialize};

/// Kinds of provider notifications the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderEventKind {
    /// An invoice for a billing period was paid.
    InvoicePaid,
    /// The provider reports the subscription canceled or unpaid.
    SubscriptionCanceled,
    /// The user completed the hosted checkout flow.
    CheckoutCompleted,
    /// The initial payment attempt expired before completing.
    FirstPaymentExpired,
}

/// Payment details carried by an invoice-paid event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotice {
    /// Amount in minor units, opaque to the engine.
    pub amount: i64,
    pub currency: String,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    pub paid_at: Timestamp,
}

/// An authenticated, already-deduplicatable provider notification.
///
/// `external_event_id` is the provider's event/invoice identifier; replays
/// carry the same id and are absorbed by the ledger's uniqueness guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub external_event_id: String,
    pub kind: ProviderEventKind,
    pub external_subscription_id: Option<String>,
    pub external_customer_id: Option<String>,
    pub checkout_session_ref: Option<String>,
    pub payment: Option<PaymentNotice>,
}

impl ProviderEvent {
    /// Creates an invoice-paid event.
    pub fn invoice_paid(
        external_event_id: impl Into<String>,
        external_subscription_id: Option<String>,
        external_customer_id: Option<String>,
        payment: PaymentNotice,
    ) -> Self {
        Self {
            external_event_id: external_event_id.into(),
            kind: ProviderEventKind::InvoicePaid,
            external_subscription_id,
            external_customer_id,
            checkout_session_ref: None,
            payment: Some(payment),
        }
    }

    /// Creates a subscription-canceled event.
    pub fn subscription_canceled(
        external_event_id: impl Into<String>,
        external_subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            external_event_id: external_event_id.into(),
            kind: ProviderEventKind::SubscriptionCanceled,
            external_subscription_id: Some(external_subscription_id.into()),
            external_customer_id: None,
            checkout_session_ref: None,
            payment: None,
        }
    }

    /// Creates a checkout-completed event.
    pub fn checkout_completed(
        external_event_id: impl Into<String>,
        checkout_session_ref: impl Into<String>,
        external_subscription_id: impl Into<String>,
        external_customer_id: Option<String>,
    ) -> Self {
        Self {
            external_event_id: external_event_id.into(),
            kind: ProviderEventKind::CheckoutCompleted,
            external_subscription_id: Some(external_subscription_id.into()),
            external_customer_id,
            checkout_session_ref: Some(checkout_session_ref.into()),
            payment: None,
        }
    }

    /// Creates a first-payment-expired event.
    pub fn first_payment_expired(
        external_event_id: impl Into<String>,
        external_subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            external_event_id: external_event_id.into(),
            kind: ProviderEventKind::FirstPaymentExpired,
            external_subscription_id: Some(external_subscription_id.into()),
            external_customer_id: None,
            checkout_session_ref: None,
            payment: None,
        }
    }
}
