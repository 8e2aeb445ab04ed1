//! Payment ledger port.
//!
//! Append-only storage of payment rows. The uniqueness of
//! `external_event_id` is the single idempotency boundary of the engine;
//! every other component's replay safety derives from it.

use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp};
use crate::domain::membership::Payment;
use async_trait::async_trait;

/// Result of appending to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new row was written.
    Recorded(Payment),
    /// A row with the same `external_event_id` already exists; nothing
    /// was written and the existing row is returned.
    AlreadyRecorded(Payment),
}

impl AppendOutcome {
    /// Returns true if the append wrote a new row.
    pub fn is_new(&self) -> bool {
        matches!(self, AppendOutcome::Recorded(_))
    }

    /// The row the ledger holds for this event id, new or pre-existing.
    pub fn payment(&self) -> &Payment {
        match self {
            AppendOutcome::Recorded(p) | AppendOutcome::AlreadyRecorded(p) => p,
        }
    }
}

/// Port for the append-only payment ledger.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Append a payment row, idempotently.
    ///
    /// If a row with the same `external_event_id` exists the call performs
    /// no write and returns it. Rows are never mutated or deleted.
    async fn append(&self, payment: Payment) -> Result<AppendOutcome, DomainError>;

    /// True iff a paid row exists whose coverage window contains the
    /// instant, bounds inclusive on both ends.
    async fn has_payment_covering(
        &self,
        subscription_id: &SubscriptionId,
        instant: Timestamp,
    ) -> Result<bool, DomainError>;

    /// All rows for a subscription, ordered by `period_start`.
    async fn payments_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Payment>, DomainError>;
}
