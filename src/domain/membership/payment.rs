//! Payment ledger entry.
//!
//! The ledger is the system of record for "was period X paid." Rows are
//! created by the webhook path only, never mutated or deleted afterwards.

use crate::domain::foundation::{PaymentId, SubscriptionId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// Status of a ledger entry.
///
/// Only successful payments are persisted; failed and pending provider
/// states never become ledger rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
}

/// Append-only record that a coverage window was paid for.
///
/// `external_event_id` is the provider's invoice identifier and is unique
/// across all rows; replaying a webhook never creates a duplicate entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub subscription_id: SubscriptionId,
    pub external_event_id: String,
    pub status: PaymentStatus,
    /// Amount in minor units. Opaque to the engine, never interpreted.
    pub amount: i64,
    pub currency: String,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    pub paid_at: Timestamp,
    pub created_at: Timestamp,
}

impl Payment {
    /// Creates a ledger entry for a successful payment.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the idempotency key is empty or the
    /// coverage window is inverted.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        subscription_id: SubscriptionId,
        external_event_id: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
        period_start: Timestamp,
        period_end: Timestamp,
        paid_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        let external_event_id = external_event_id.into();
        if external_event_id.trim().is_empty() {
            return Err(ValidationError::empty_field("external_event_id"));
        }
        let currency = currency.into();
        if currency.trim().is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }
        if period_end.is_before(&period_start) {
            return Err(ValidationError::invalid_format(
                "period_end",
                "coverage window ends before it starts",
            ));
        }
        Ok(Self {
            id: PaymentId::new(),
            subscription_id,
            external_event_id,
            status: PaymentStatus::Paid,
            amount,
            currency,
            period_start,
            period_end,
            paid_at,
            created_at: Timestamp::now(),
        })
    }

    /// Returns true if this payment's coverage window contains the instant.
    ///
    /// Bounds are inclusive on both ends.
    pub fn covers(&self, instant: Timestamp) -> bool {
        self.period_start <= instant && instant <= self.period_end
    }
}
