//! Stripe-specific types for webhook handling.
//!
//! These types parse Stripe JSON as it arrives on the wire and translate
//! it into the engine's provider event model. The translation is where
//! Stripe's open-ended event vocabulary collapses into the closed set the
//! processor handles.

use serde::{Deserialize, Serialize};

use crate::domain::membership::{PaymentNotice, ProviderEvent, WebhookError};
use crate::domain::foundation::Timestamp;

/// Parsed Stripe-Signature header components.
///
/// Header format: `t=timestamp,v1=signature[,v0=legacy]`.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe generated the event.
    pub timestamp: i64,

    /// Primary v1 signature (HMAC-SHA256, hex-decoded).
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parses a Stripe-Signature header into components.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        if header.is_empty() {
            return Err(WebhookError::ParseError(
                "Missing Stripe-Signature header".to_string(),
            ));
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "t" => {
                    timestamp = Some(value.trim().parse().map_err(|_| {
                        WebhookError::ParseError("Invalid timestamp in signature".to_string())
                    })?);
                }
                "v1" => {
                    v1_signature = Some(hex::decode(value.trim()).map_err(|_| {
                        WebhookError::ParseError("Signature is not valid hex".to_string())
                    })?);
                }
                // Unknown fields (v0 and future schemes) are skipped
                _ => {}
            }
        }

        Ok(Self {
            timestamp: timestamp.ok_or_else(|| {
                WebhookError::ParseError("Missing timestamp (t=) in signature".to_string())
            })?,
            v1_signature: v1_signature.ok_or_else(|| {
                WebhookError::ParseError("Missing v1 signature in header".to_string())
            })?,
        })
    }
}

/// Raw Stripe webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type string (e.g. "invoice.paid").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    /// Event payload containing the affected object.
    pub data: StripeEventData,

    /// Whether this is a live or test event.
    pub livemode: bool,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,
}

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    /// Customer attached to the session.
    pub customer: Option<String>,

    /// Subscription created by the session.
    pub subscription: Option<String>,

    /// URL the user completes checkout on.
    pub url: Option<String>,

    /// Unix timestamp when the session expires.
    pub expires_at: Option<i64>,
}

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    pub email: Option<String>,

    #[serde(default)]
    pub deleted: bool,
}

/// Stripe list envelope for customer search results.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomerList {
    #[serde(default)]
    pub data: Vec<StripeCustomer>,
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    /// Customer owning this subscription.
    pub customer: String,

    /// Subscription status string.
    pub status: String,
}

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    pub customer: String,

    pub subscription: Option<String>,

    /// Amount paid in minor units.
    pub amount_paid: i64,

    pub currency: String,

    #[serde(default)]
    pub lines: StripeInvoiceLines,
}

/// Invoice lines container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeInvoiceLines {
    #[serde(default)]
    pub data: Vec<StripeInvoiceLineItem>,
}

/// Single invoice line item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoiceLineItem {
    pub id: String,

    pub amount: i64,

    /// Billing period covered by this line.
    pub period: StripeInvoicePeriod,
}

/// Invoice line item period.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoicePeriod {
    /// Period start (Unix timestamp).
    pub start: i64,

    /// Period end (Unix timestamp).
    pub end: i64,
}

impl StripeWebhookEvent {
    /// Translates this Stripe event into the engine's event model.
    ///
    /// Returns `Ok(None)` for event types the engine doesn't react to;
    /// the transport layer acknowledges those without further processing.
    pub fn to_provider_event(&self) -> Result<Option<ProviderEvent>, WebhookError> {
        match self.event_type.as_str() {
            "invoice.paid" => {
                let invoice: StripeInvoice = serde_json::from_value(self.data.object.clone())
                    .map_err(|e| WebhookError::ParseError(format!("Invalid invoice: {}", e)))?;

                // The first line carries the billing period for the plan
                let period = invoice
                    .lines
                    .data
                    .first()
                    .map(|line| line.period.clone())
                    .ok_or(WebhookError::MissingField("lines"))?;

                let notice = PaymentNotice {
                    amount: invoice.amount_paid,
                    currency: invoice.currency.clone(),
                    period_start: Timestamp::from_unix_secs(period.start.max(0) as u64),
                    period_end: Timestamp::from_unix_secs(period.end.max(0) as u64),
                    paid_at: Timestamp::from_unix_secs(self.created.max(0) as u64),
                };

                // The invoice id, not the event id, is the idempotency key:
                // Stripe may deliver the same invoice under several event ids
                Ok(Some(ProviderEvent::invoice_paid(
                    invoice.id,
                    invoice.subscription,
                    Some(invoice.customer),
                    notice,
                )))
            }

            "customer.subscription.deleted" => {
                let sub: StripeSubscription = serde_json::from_value(self.data.object.clone())
                    .map_err(|e| {
                        WebhookError::ParseError(format!("Invalid subscription: {}", e))
                    })?;
                Ok(Some(ProviderEvent::subscription_canceled(
                    self.id.clone(),
                    sub.id,
                )))
            }

            "customer.subscription.updated" => {
                let sub: StripeSubscription = serde_json::from_value(self.data.object.clone())
                    .map_err(|e| {
                        WebhookError::ParseError(format!("Invalid subscription: {}", e))
                    })?;
                match sub.status.as_str() {
                    "canceled" | "unpaid" => Ok(Some(ProviderEvent::subscription_canceled(
                        self.id.clone(),
                        sub.id,
                    ))),
                    "incomplete_expired" => Ok(Some(ProviderEvent::first_payment_expired(
                        self.id.clone(),
                        sub.id,
                    ))),
                    // Other status changes are driven by their own events
                    _ => Ok(None),
                }
            }

            "checkout.session.completed" => {
                let session: StripeCheckoutSession =
                    serde_json::from_value(self.data.object.clone()).map_err(|e| {
                        WebhookError::ParseError(format!("Invalid checkout session: {}", e))
                    })?;
                let subscription_id = session
                    .subscription
                    .ok_or(WebhookError::MissingField("subscription"))?;
                Ok(Some(ProviderEvent::checkout_completed(
                    self.id.clone(),
                    session.id,
                    subscription_id,
                    session.customer,
                )))
            }

            _ => Ok(None),
        }
    }
}
