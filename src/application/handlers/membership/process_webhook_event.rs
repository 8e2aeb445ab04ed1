//! ProcessWebhookEventHandler - ingests authenticated provider events.
//!
//! Single entry point `handle(event)` dispatching on the event kind. Every
//! branch is safe to invoke twice with the same event and safe to invoke
//! out of order relative to other events for the same subscription: replays
//! are absorbed by the ledger's unique event id, and out-of-order events
//! with no valid transition are refused rather than forced.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::foundation::Timestamp;
use crate::domain::membership::{
    Payment, ProviderEvent, ProviderEventKind, Subscription, Transition, WebhookError,
};
use crate::ports::{PaymentLedger, SubscriptionRepository};

/// Outcome of processing one provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event changed local state.
    Applied,
    /// The event had already been applied; idempotent skip.
    AlreadyApplied,
    /// The event required no local action and was acknowledged.
    Ignored,
}

/// Handler for authenticated provider webhook events.
pub struct ProcessWebhookEventHandler {
    repository: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn PaymentLedger>,
}

impl ProcessWebhookEventHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn PaymentLedger>,
    ) -> Self {
        Self { repository, ledger }
    }

    /// Processes one event. Signature verification has already happened at
    /// the transport layer; this method trusts the event.
    pub async fn handle(&self, event: ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        match event.kind {
            ProviderEventKind::InvoicePaid => self.on_invoice_paid(event).await,
            ProviderEventKind::SubscriptionCanceled => self.on_subscription_canceled(event).await,
            ProviderEventKind::CheckoutCompleted => self.on_checkout_completed(event).await,
            ProviderEventKind::FirstPaymentExpired => self.on_first_payment_expired(event).await,
        }
    }

    /// Invoice paid: append to the ledger, then activate if the new
    /// payment covers now.
    async fn on_invoice_paid(&self, event: ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        let notice = event.payment.ok_or(WebhookError::MissingField("payment"))?;

        // Resolution order: subscription id first, customer id as fallback
        let subscription = if let Some(sub_id) = event.external_subscription_id.as_deref() {
            self.repository.find_by_external_subscription_id(sub_id).await?
        } else if let Some(cus_id) = event.external_customer_id.as_deref() {
            self.repository.find_by_external_customer_id(cus_id).await?
        } else {
            return Err(WebhookError::MissingField("subscription_id"));
        };

        let Some(mut subscription) = subscription else {
            // A payment exists externally with no local counterpart. Real
            // money with no local accounting, so this is loud and retried.
            let reference = event
                .external_subscription_id
                .or(event.external_customer_id)
                .unwrap_or_default();
            error!(
                external_event_id = %event.external_event_id,
                reference = %reference,
                "Invoice paid for unknown subscription"
            );
            return Err(WebhookError::NoLocalSubscription(reference));
        };

        let payment = Payment::record(
            subscription.id,
            event.external_event_id.clone(),
            notice.amount,
            notice.currency,
            notice.period_start,
            notice.period_end,
            notice.paid_at,
        )
        .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let outcome = self.ledger.append(payment).await?;
        if !outcome.is_new() {
            info!(
                external_event_id = %event.external_event_id,
                subscription_id = %subscription.id,
                "Invoice already recorded, idempotent skip"
            );
            return Ok(WebhookOutcome::AlreadyApplied);
        }

        // Only a payment covering now drives the state machine; a past
        // period is recorded but changes nothing.
        if outcome.payment().covers(Timestamp::now()) {
            let transition = subscription.activate()?;
            self.persist_transition(&subscription, transition).await?;
        }

        Ok(WebhookOutcome::Applied)
    }

    /// Subscription canceled or unpaid at the provider.
    async fn on_subscription_canceled(
        &self,
        event: ProviderEvent,
    ) -> Result<WebhookOutcome, WebhookError> {
        let sub_id = event
            .external_subscription_id
            .as_deref()
            .ok_or(WebhookError::MissingField("subscription_id"))?;

        let Some(mut subscription) = self
            .repository
            .find_by_external_subscription_id(sub_id)
            .await?
        else {
            // Never fully provisioned locally; nothing to cancel
            warn!(
                external_event_id = %event.external_event_id,
                external_subscription_id = %sub_id,
                "Cancellation for unknown subscription, dropped"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        match subscription.cancel() {
            Ok(Transition::Skipped) => Ok(WebhookOutcome::AlreadyApplied),
            Ok(transition) => {
                self.persist_transition(&subscription, transition).await?;
                Ok(WebhookOutcome::Applied)
            }
            Err(e) => {
                error!(
                    subscription_id = %subscription.id,
                    status = %subscription.status,
                    "Refused cancellation: {}",
                    e
                );
                Err(WebhookError::from(e))
            }
        }
    }

    /// Checkout completed: link the pending row to the provider's
    /// subscription and customer ids.
    async fn on_checkout_completed(
        &self,
        event: ProviderEvent,
    ) -> Result<WebhookOutcome, WebhookError> {
        let session_ref = event
            .checkout_session_ref
            .as_deref()
            .ok_or(WebhookError::MissingField("checkout_session_ref"))?;
        let external_subscription_id = event
            .external_subscription_id
            .clone()
            .ok_or(WebhookError::MissingField("subscription_id"))?;

        let Some(mut subscription) = self
            .repository
            .find_by_checkout_session(session_ref)
            .await?
        else {
            warn!(
                external_event_id = %event.external_event_id,
                session = %session_ref,
                "Checkout completion for unknown session, dropped"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        match subscription.confirm_checkout(external_subscription_id, event.external_customer_id)
        {
            Ok(Transition::Skipped) => {
                info!(
                    subscription_id = %subscription.id,
                    "Checkout already confirmed, idempotent skip"
                );
                Ok(WebhookOutcome::AlreadyApplied)
            }
            Ok(_) => {
                self.repository.update(&subscription).await?;
                info!(
                    subscription_id = %subscription.id,
                    external_subscription_id = ?subscription.external_subscription_id,
                    "Checkout confirmed"
                );
                Ok(WebhookOutcome::Applied)
            }
            Err(e) => {
                error!(subscription_id = %subscription.id, "Refused checkout relink: {}", e);
                Err(WebhookError::from(e))
            }
        }
    }

    /// First payment attempt expired at the provider.
    async fn on_first_payment_expired(
        &self,
        event: ProviderEvent,
    ) -> Result<WebhookOutcome, WebhookError> {
        let sub_id = event
            .external_subscription_id
            .as_deref()
            .ok_or(WebhookError::MissingField("subscription_id"))?;

        let Some(mut subscription) = self
            .repository
            .find_by_external_subscription_id(sub_id)
            .await?
        else {
            warn!(
                external_event_id = %event.external_event_id,
                external_subscription_id = %sub_id,
                "First-payment expiry for unknown subscription, dropped"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        // Guard: a subscription with any payment must never regress
        let payment_count = self.ledger.payments_for(&subscription.id).await?.len();

        match subscription.expire_first_payment(payment_count) {
            Ok(Transition::Skipped) => Ok(WebhookOutcome::AlreadyApplied),
            Ok(transition) => {
                self.persist_transition(&subscription, transition).await?;
                Ok(WebhookOutcome::Applied)
            }
            Err(e) => {
                error!(
                    subscription_id = %subscription.id,
                    status = %subscription.status,
                    payments = payment_count,
                    "Refused first-payment expiry: {}",
                    e
                );
                Err(WebhookError::from(e))
            }
        }
    }

    async fn persist_transition(
        &self,
        subscription: &Subscription,
        transition: Transition,
    ) -> Result<(), WebhookError> {
        self.repository.update(subscription).await?;
        if let Transition::Applied { from } = transition {
            info!(
                subscription_id = %subscription.id,
                user_id = %subscription.user_id,
                "Switching subscription from {} to {}",
                from,
                subscription.status
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryPaymentLedger, InMemorySubscriptionRepository};
    use crate::domain::foundation::UserId;
    use crate::domain::membership::{PaymentNotice, SubscriptionStatus};

    struct Fixture {
        repo: Arc<InMemorySubscriptionRepository>,
        ledger: Arc<InMemoryPaymentLedger>,
        handler: ProcessWebhookEventHandler,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let handler = ProcessWebhookEventHandler::new(repo.clone(), ledger.clone());
        Fixture {
            repo,
            ledger,
            handler,
        }
    }

    async fn seed_linked_subscription(f: &Fixture, user: &str, ext_sub: &str) -> Subscription {
        let mut sub =
            Subscription::new_enrollment(UserId::new(user).unwrap(), "cus_1".to_string());
        sub.set_checkout_session_ref(format!("cs_{}", user));
        sub.confirm_checkout(ext_sub.to_string(), None).unwrap();
        f.repo.save(&sub).await.unwrap();
        sub
    }

    fn covering_notice() -> PaymentNotice {
        let now = Timestamp::now();
        PaymentNotice {
            amount: 1000,
            currency: "eur".to_string(),
            period_start: now.minus_days(1),
            period_end: now.add_days(30),
            paid_at: now,
        }
    }

    fn past_notice() -> PaymentNotice {
        let now = Timestamp::now();
        PaymentNotice {
            amount: 1000,
            currency: "eur".to_string(),
            period_start: now.minus_days(60),
            period_end: now.minus_days(30),
            paid_at: now.minus_days(60),
        }
    }

    // Invoice paid

    #[tokio::test]
    async fn covering_invoice_activates_pending_subscription() {
        let f = fixture();
        let sub = seed_linked_subscription(&f, "u1", "sub_ext_1").await;

        let outcome = f
            .handler
            .handle(ProviderEvent::invoice_paid(
                "in_1",
                Some("sub_ext_1".to_string()),
                None,
                covering_notice(),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Applied);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(f.ledger.payments_for(&sub.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn past_period_invoice_is_recorded_without_activation() {
        let f = fixture();
        let sub = seed_linked_subscription(&f, "u1", "sub_ext_1").await;

        let outcome = f
            .handler
            .handle(ProviderEvent::invoice_paid(
                "in_1",
                Some("sub_ext_1".to_string()),
                None,
                past_notice(),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Applied);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Pending);
        assert_eq!(f.ledger.payments_for(&sub.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replayed_invoice_yields_one_payment_row() {
        let f = fixture();
        let sub = seed_linked_subscription(&f, "u1", "sub_ext_1").await;

        let event = ProviderEvent::invoice_paid(
            "ev_1",
            Some("sub_ext_1".to_string()),
            None,
            covering_notice(),
        );
        let first = f.handler.handle(event.clone()).await.unwrap();
        let second = f.handler.handle(event).await.unwrap();

        assert_eq!(first, WebhookOutcome::Applied);
        assert_eq!(second, WebhookOutcome::AlreadyApplied);
        let payments = f.ledger.payments_for(&sub.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].external_event_id, "ev_1");

        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn late_invoice_reactivates_canceled_subscription() {
        let f = fixture();
        let mut sub = seed_linked_subscription(&f, "u1", "sub_ext_1").await;
        sub.activate().unwrap();
        sub.cancel().unwrap();
        f.repo.update(&sub).await.unwrap();

        let outcome = f
            .handler
            .handle(ProviderEvent::invoice_paid(
                "in_late",
                Some("sub_ext_1".to_string()),
                None,
                covering_notice(),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Applied);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn invoice_for_unknown_subscription_is_a_hard_error() {
        let f = fixture();

        let err = f
            .handler
            .handle(ProviderEvent::invoice_paid(
                "in_orphan",
                Some("sub_missing".to_string()),
                None,
                covering_notice(),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::NoLocalSubscription(ref r) if r == "sub_missing"));
    }

    #[tokio::test]
    async fn invoice_resolves_by_customer_id_when_subscription_id_missing() {
        let f = fixture();
        let sub = seed_linked_subscription(&f, "u1", "sub_ext_1").await;

        let outcome = f
            .handler
            .handle(ProviderEvent::invoice_paid(
                "in_1",
                None,
                Some("cus_1".to_string()),
                covering_notice(),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Applied);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn invoice_without_any_reference_is_rejected() {
        let f = fixture();
        let err = f
            .handler
            .handle(ProviderEvent::invoice_paid(
                "in_1",
                None,
                None,
                covering_notice(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::MissingField("subscription_id")));
    }

    // Subscription canceled

    #[tokio::test]
    async fn cancellation_moves_active_to_canceled() {
        let f = fixture();
        let mut sub = seed_linked_subscription(&f, "u1", "sub_ext_1").await;
        sub.activate().unwrap();
        f.repo.update(&sub).await.unwrap();

        let outcome = f
            .handler
            .handle(ProviderEvent::subscription_canceled("ev_c", "sub_ext_1"))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Applied);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn duplicate_cancellation_is_skipped() {
        let f = fixture();
        let mut sub = seed_linked_subscription(&f, "u1", "sub_ext_1").await;
        sub.activate().unwrap();
        f.repo.update(&sub).await.unwrap();

        f.handler
            .handle(ProviderEvent::subscription_canceled("ev_c1", "sub_ext_1"))
            .await
            .unwrap();
        let outcome = f
            .handler
            .handle(ProviderEvent::subscription_canceled("ev_c2", "sub_ext_1"))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn cancellation_for_unknown_subscription_is_dropped() {
        let f = fixture();
        let outcome = f
            .handler
            .handle(ProviderEvent::subscription_canceled("ev_c", "sub_missing"))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn cancellation_of_pending_subscription_is_refused() {
        let f = fixture();
        seed_linked_subscription(&f, "u1", "sub_ext_1").await;

        let err = f
            .handler
            .handle(ProviderEvent::subscription_canceled("ev_c", "sub_ext_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::InconsistentTransition(_)));
    }

    // Checkout completed

    #[tokio::test]
    async fn checkout_completion_links_external_ids() {
        let f = fixture();
        let mut sub =
            Subscription::new_enrollment(UserId::new("u1").unwrap(), "cus_1".to_string());
        sub.set_checkout_session_ref("cs_1".to_string());
        f.repo.save(&sub).await.unwrap();

        let outcome = f
            .handler
            .handle(ProviderEvent::checkout_completed(
                "ev_cc",
                "cs_1",
                "sub_ext_new",
                Some("cus_1".to_string()),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Applied);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(
            stored.external_subscription_id,
            Some("sub_ext_new".to_string())
        );
        // Completion alone never activates; activation needs a payment
        assert_eq!(stored.status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn repeated_checkout_completion_is_skipped() {
        let f = fixture();
        let mut sub =
            Subscription::new_enrollment(UserId::new("u1").unwrap(), "cus_1".to_string());
        sub.set_checkout_session_ref("cs_1".to_string());
        f.repo.save(&sub).await.unwrap();

        let event = ProviderEvent::checkout_completed("ev_cc", "cs_1", "sub_ext_new", None);
        f.handler.handle(event.clone()).await.unwrap();
        let outcome = f.handler.handle(event).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn checkout_completion_for_unknown_session_is_dropped() {
        let f = fixture();
        let outcome = f
            .handler
            .handle(ProviderEvent::checkout_completed(
                "ev_cc",
                "cs_missing",
                "sub_ext_new",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    // First payment expired

    #[tokio::test]
    async fn first_payment_expiry_writes_off_pending_subscription() {
        let f = fixture();
        let sub = seed_linked_subscription(&f, "u1", "sub_ext_1").await;

        let outcome = f
            .handler
            .handle(ProviderEvent::first_payment_expired("ev_fpe", "sub_ext_1"))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Applied);
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::FirstPaymentExpired);
    }

    #[tokio::test]
    async fn first_payment_expiry_with_recorded_payment_is_refused() {
        let f = fixture();
        let sub = seed_linked_subscription(&f, "u1", "sub_ext_1").await;
        f.handler
            .handle(ProviderEvent::invoice_paid(
                "in_1",
                Some("sub_ext_1".to_string()),
                None,
                past_notice(),
            ))
            .await
            .unwrap();

        let err = f
            .handler
            .handle(ProviderEvent::first_payment_expired("ev_fpe", "sub_ext_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::InconsistentTransition(_)));
        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Pending);
    }

    // Out-of-order safety

    #[tokio::test]
    async fn cancellation_before_checkout_completion_never_activates() {
        let f = fixture();
        let mut sub =
            Subscription::new_enrollment(UserId::new("u1").unwrap(), "cus_1".to_string());
        sub.set_checkout_session_ref("cs_1".to_string());
        f.repo.save(&sub).await.unwrap();

        // Cancellation arrives first; the external id isn't linked yet
        let outcome = f
            .handler
            .handle(ProviderEvent::subscription_canceled("ev_c", "sub_ext_1"))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);

        // Then the completion lands
        f.handler
            .handle(ProviderEvent::checkout_completed(
                "ev_cc", "cs_1", "sub_ext_1", None,
            ))
            .await
            .unwrap();

        let stored = f.repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Pending);
        assert!(f
            .ledger
            .payments_for(&sub.id)
            .await
            .unwrap()
            .is_empty());
    }
}
