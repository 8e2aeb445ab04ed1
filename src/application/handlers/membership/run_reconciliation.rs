//! RunReconciliationHandler - the periodic sweep.
//!
//! Re-derives every subscription's status from the payment ledger and
//! applies corrective transitions. The sweep is idempotent: once the
//! ledger stops changing, a second run applies zero transitions.

use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info};

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::membership::{
    decide_sweep_action, Subscription, SweepAction, SweepSummary, SubscriptionStatus, Transition,
};
use crate::ports::{PaymentLedger, SubscriptionRepository};

/// Handler that runs one reconciliation sweep over all subscriptions.
pub struct RunReconciliationHandler {
    repository: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn PaymentLedger>,
    pending_ttl: Duration,
    page_size: u32,
}

impl RunReconciliationHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn PaymentLedger>,
        pending_ttl: Duration,
        page_size: u32,
    ) -> Self {
        Self {
            repository,
            ledger,
            pending_ttl,
            page_size,
        }
    }

    /// Sweeps every subscription once and returns the transition counts.
    ///
    /// A failure on one row is logged and counted; the sweep carries on. Only
    /// a paging failure aborts the run, and the next tick resumes from scratch.
    pub async fn run(&self) -> Result<SweepSummary, DomainError> {
        let now = Timestamp::now();
        let mut summary = SweepSummary::default();
        let mut cursor = None;

        loop {
            let page = self.repository.list_page(cursor, self.page_size).await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(last.id);

            for subscription in page {
                summary.scanned += 1;
                if let Err(e) = self.reconcile_one(subscription, now, &mut summary).await {
                    summary.failed += 1;
                    error!("Sweep skipped a subscription: {}", e);
                }
            }
        }

        info!(
            scanned = summary.scanned,
            activated = summary.activated,
            lapsed = summary.lapsed,
            first_payment_expired = summary.first_payment_expired,
            failed = summary.failed,
            "Reconciliation sweep finished"
        );
        Ok(summary)
    }

    async fn reconcile_one(
        &self,
        mut subscription: Subscription,
        now: Timestamp,
        summary: &mut SweepSummary,
    ) -> Result<(), DomainError> {
        if subscription.status == SubscriptionStatus::FirstPaymentExpired {
            return Ok(());
        }

        let has_coverage = self
            .ledger
            .has_payment_covering(&subscription.id, now)
            .await?;
        // Payment count only gates the pending write-off
        let payment_count = if subscription.status == SubscriptionStatus::Pending {
            self.ledger.payments_for(&subscription.id).await?.len()
        } else {
            0
        };

        let Some(action) = decide_sweep_action(
            &subscription,
            has_coverage,
            payment_count,
            now,
            self.pending_ttl,
        ) else {
            return Ok(());
        };

        let transition = match action {
            SweepAction::Activate => subscription.activate()?,
            SweepAction::Lapse => subscription.lapse()?,
            SweepAction::ExpireFirstPayment => subscription.expire_first_payment(payment_count)?,
        };

        if let Transition::Applied { from } = transition {
            self.repository.update(&subscription).await?;
            info!(
                subscription_id = %subscription.id,
                user_id = %subscription.user_id,
                "Switching subscription from {} to {}",
                from,
                subscription.status
            );
            match action {
                SweepAction::Activate => summary.activated += 1,
                SweepAction::Lapse => summary.lapsed += 1,
                SweepAction::ExpireFirstPayment => summary.first_payment_expired += 1,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryPaymentLedger, InMemorySubscriptionRepository};
    use crate::domain::foundation::UserId;
    use crate::domain::membership::Payment;

    struct Fixture {
        repo: Arc<InMemorySubscriptionRepository>,
        ledger: Arc<InMemoryPaymentLedger>,
        handler: RunReconciliationHandler,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let handler = RunReconciliationHandler::new(
            repo.clone(),
            ledger.clone(),
            Duration::hours(24),
            2, // small page size so multi-page paths run in tests
        );
        Fixture {
            repo,
            ledger,
            handler,
        }
    }

    async fn seed(f: &Fixture, user: &str, status: SubscriptionStatus) -> Subscription {
        let mut sub =
            Subscription::new_enrollment(UserId::new(user).unwrap(), "cus_1".to_string());
        match status {
            SubscriptionStatus::Pending => {}
            SubscriptionStatus::Active => {
                sub.activate().unwrap();
            }
            SubscriptionStatus::Canceled => {
                sub.activate().unwrap();
                sub.cancel().unwrap();
            }
            SubscriptionStatus::Expired => {
                sub.activate().unwrap();
                sub.lapse().unwrap();
            }
            SubscriptionStatus::FirstPaymentExpired => {
                sub.expire_first_payment(0).unwrap();
            }
        }
        f.repo.save(&sub).await.unwrap();
        sub
    }

    async fn pay_covering(f: &Fixture, sub: &Subscription, event_id: &str) {
        let now = Timestamp::now();
        let payment = Payment::record(
            sub.id,
            event_id.to_string(),
            1000,
            "eur".to_string(),
            now.minus_days(1),
            now.add_days(30),
            now,
        )
        .unwrap();
        f.ledger.append(payment).await.unwrap();
    }

    #[tokio::test]
    async fn activates_pending_subscription_with_coverage() {
        let f = fixture();
        let sub = seed(&f, "u1", SubscriptionStatus::Pending).await;
        pay_covering(&f, &sub, "ev_1").await;

        let summary = f.handler.run().await.unwrap();

        assert_eq!(summary.activated, 1);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn lapses_active_subscription_without_coverage() {
        let f = fixture();
        let sub = seed(&f, "u1", SubscriptionStatus::Active).await;

        let summary = f.handler.run().await.unwrap();

        assert_eq!(summary.lapsed, 1);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn reactivates_canceled_subscription_with_coverage() {
        let f = fixture();
        let sub = seed(&f, "u1", SubscriptionStatus::Canceled).await;
        pay_covering(&f, &sub, "ev_1").await;

        let summary = f.handler.run().await.unwrap();

        assert_eq!(summary.activated, 1);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn writes_off_stale_pending_enrollment() {
        let f = fixture();
        let mut sub = seed(&f, "u1", SubscriptionStatus::Pending).await;
        sub.created_at = sub.created_at.minus_hours(25);
        f.repo.update(&sub).await.unwrap();

        let summary = f.handler.run().await.unwrap();

        assert_eq!(summary.first_payment_expired, 1);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::FirstPaymentExpired);
    }

    #[tokio::test]
    async fn fresh_pending_enrollment_is_left_alone() {
        let f = fixture();
        let sub = seed(&f, "u1", SubscriptionStatus::Pending).await;

        let summary = f.handler.run().await.unwrap();

        assert_eq!(summary.transitions(), 0);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn second_sweep_is_a_fixed_point() {
        let f = fixture();
        let pending = seed(&f, "u1", SubscriptionStatus::Pending).await;
        pay_covering(&f, &pending, "ev_1").await;
        seed(&f, "u2", SubscriptionStatus::Active).await;
        let canceled = seed(&f, "u3", SubscriptionStatus::Canceled).await;
        pay_covering(&f, &canceled, "ev_2").await;

        let first = f.handler.run().await.unwrap();
        assert_eq!(first.transitions(), 3);

        let second = f.handler.run().await.unwrap();
        assert_eq!(second.transitions(), 0);
        assert_eq!(second.scanned, first.scanned);
    }

    #[tokio::test]
    async fn sweep_pages_through_all_rows() {
        let f = fixture();
        // Five rows, page size two: three pages plus the empty terminator
        for i in 0..5 {
            seed(&f, &format!("u{}", i), SubscriptionStatus::Active).await;
        }

        let summary = f.handler.run().await.unwrap();

        assert_eq!(summary.scanned, 5);
        assert_eq!(summary.lapsed, 5);
    }

    #[tokio::test]
    async fn terminal_write_offs_are_never_revived() {
        let f = fixture();
        let sub = seed(&f, "u1", SubscriptionStatus::FirstPaymentExpired).await;
        pay_covering(&f, &sub, "ev_1").await;

        let summary = f.handler.run().await.unwrap();

        assert_eq!(summary.transitions(), 0);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::FirstPaymentExpired);
    }
}
