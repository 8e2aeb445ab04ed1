//! In-memory payment ledger.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp};
use crate::domain::membership::Payment;
use crate::ports::{AppendOutcome, PaymentLedger};

/// In-memory implementation of [`PaymentLedger`].
///
/// Append-only: rows are pushed and never touched again.
#[derive(Default)]
pub struct InMemoryPaymentLedger {
    rows: Arc<RwLock<Vec<Payment>>>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn append(&self, payment: Payment) -> Result<AppendOutcome, DomainError> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows
            .iter()
            .find(|p| p.external_event_id == payment.external_event_id)
        {
            return Ok(AppendOutcome::AlreadyRecorded(existing.clone()));
        }
        rows.push(payment.clone());
        Ok(AppendOutcome::Recorded(payment))
    }

    async fn has_payment_covering(
        &self,
        subscription_id: &SubscriptionId,
        instant: Timestamp,
    ) -> Result<bool, DomainError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .any(|p| p.subscription_id == *subscription_id && p.covers(instant)))
    }

    async fn payments_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Payment>, DomainError> {
        let rows = self.rows.read().await;
        let mut payments: Vec<Payment> = rows
            .iter()
            .filter(|p| p.subscription_id == *subscription_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.period_start);
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(sub: SubscriptionId, event_id: &str, start: u64, end: u64) -> Payment {
        Payment::record(
            sub,
            event_id,
            1000,
            "eur",
            Timestamp::from_unix_secs(start),
            Timestamp::from_unix_secs(end),
            Timestamp::from_unix_secs(start),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn append_is_idempotent_per_event_id() {
        let ledger = InMemoryPaymentLedger::new();
        let sub = SubscriptionId::new();

        let first = ledger.append(payment(sub, "in_1", 0, 100)).await.unwrap();
        assert!(first.is_new());

        let replay = ledger.append(payment(sub, "in_1", 0, 100)).await.unwrap();
        assert!(!replay.is_new());
        assert_eq!(replay.payment().id, first.payment().id);

        assert_eq!(ledger.payments_for(&sub).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn has_payment_covering_uses_inclusive_bounds() {
        let ledger = InMemoryPaymentLedger::new();
        let sub = SubscriptionId::new();
        ledger.append(payment(sub, "in_1", 100, 200)).await.unwrap();

        assert!(ledger
            .has_payment_covering(&sub, Timestamp::from_unix_secs(100))
            .await
            .unwrap());
        assert!(ledger
            .has_payment_covering(&sub, Timestamp::from_unix_secs(200))
            .await
            .unwrap());
        assert!(!ledger
            .has_payment_covering(&sub, Timestamp::from_unix_secs(201))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn coverage_is_scoped_per_subscription() {
        let ledger = InMemoryPaymentLedger::new();
        let paid = SubscriptionId::new();
        let other = SubscriptionId::new();
        ledger.append(payment(paid, "in_1", 0, 100)).await.unwrap();

        assert!(!ledger
            .has_payment_covering(&other, Timestamp::from_unix_secs(50))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn payments_for_orders_by_period_start() {
        let ledger = InMemoryPaymentLedger::new();
        let sub = SubscriptionId::new();
        ledger.append(payment(sub, "in_2", 200, 300)).await.unwrap();
        ledger.append(payment(sub, "in_1", 0, 100)).await.unwrap();

        let payments = ledger.payments_for(&sub).await.unwrap();
        assert_eq!(payments[0].external_event_id, "in_1");
        assert_eq!(payments[1].external_event_id, "in_2");
    }
}
