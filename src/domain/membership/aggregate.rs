//! Subscription aggregate entity.
//!
//! The Subscription is the local record of a user's paid-membership
//! enrollment attempt. A user accumulates one row per attempt; at most one
//! row per user may be in a current state (Pending or Active) at a time.
//!
//! # Design Decisions
//!
//! - **Never deleted**: cancellation and expiry are status transitions,
//!   lapsed rows stay behind as the audit trail
//! - **Mutated only by the webhook path and the sweep**, never by reads
//! - **Optimistic concurrency**: `version` is checked and bumped on every
//!   persisted update, serializing mutation per subscription row

use crate::domain::foundation::{
    DomainError, ErrorCode, StateMachine, SubscriptionId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

use super::SubscriptionStatus;

/// Outcome of applying a lifecycle command to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State changed; `from` is the prior status.
    Applied { from: SubscriptionStatus },
    /// The command was already applied; nothing changed.
    Skipped,
}

impl Transition {
    /// Returns true if the command changed state.
    pub fn changed(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// Subscription aggregate - one enrollment attempt for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier for this subscription row.
    pub id: SubscriptionId,

    /// User who owns this subscription.
    pub user_id: UserId,

    /// Current status in the lifecycle.
    pub status: SubscriptionStatus,

    /// Billing customer id at the payment provider.
    pub external_customer_id: Option<String>,

    /// Recurring subscription id at the payment provider.
    /// Immutable once set.
    pub external_subscription_id: Option<String>,

    /// Checkout session handed to the user; resolves the completion event.
    pub checkout_session_ref: Option<String>,

    /// When the subscription row was created.
    pub created_at: Timestamp,

    /// When the subscription was last updated.
    pub updated_at: Timestamp,

    /// Optimistic-concurrency counter, bumped by the repository on update.
    pub version: u64,
}

impl Subscription {
    /// Creates a new enrollment attempt in Pending.
    ///
    /// The billing customer is resolved before the row is created, so the
    /// customer id is always present from the start.
    pub fn new_enrollment(user_id: UserId, external_customer_id: String) -> Self {
        let now = Timestamp::now();
        Self {
            id: SubscriptionId::new(),
            user_id,
            status: SubscriptionStatus::Pending,
            external_customer_id: Some(external_customer_id),
            external_subscription_id: None,
            checkout_session_ref: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Returns true if this subscription grants access right now.
    pub fn has_access(&self) -> bool {
        self.status.grants_access()
    }

    /// Returns true if this row blocks a new enrollment for the user.
    pub fn is_current(&self) -> bool {
        self.status.is_current()
    }

    /// Activates the subscription after a payment covering now.
    ///
    /// Skips when already Active (duplicate or replayed event).
    pub fn activate(&mut self) -> Result<Transition, DomainError> {
        if self.status == SubscriptionStatus::Active {
            return Ok(Transition::Skipped);
        }
        self.apply(SubscriptionStatus::Active)
    }

    /// Marks the subscription canceled after an explicit provider
    /// cancellation or unpaid notice.
    pub fn cancel(&mut self) -> Result<Transition, DomainError> {
        if self.status == SubscriptionStatus::Canceled {
            return Ok(Transition::Skipped);
        }
        self.apply(SubscriptionStatus::Canceled)
    }

    /// Marks the subscription expired when no payment covers now and the
    /// provider has not explicitly canceled.
    pub fn lapse(&mut self) -> Result<Transition, DomainError> {
        if self.status == SubscriptionStatus::Expired {
            return Ok(Transition::Skipped);
        }
        self.apply(SubscriptionStatus::Expired)
    }

    /// Marks the initial payment attempt as expired.
    ///
    /// Guarded: a subscription with any recorded payment must never regress
    /// to this state. A violated guard is refused without mutating.
    pub fn expire_first_payment(&mut self, payment_count: usize) -> Result<Transition, DomainError> {
        if self.status == SubscriptionStatus::FirstPaymentExpired {
            return Ok(Transition::Skipped);
        }
        if payment_count > 0 {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Subscription {} has {} payment(s), refusing first-payment expiry",
                    self.id, payment_count
                ),
            ));
        }
        self.apply(SubscriptionStatus::FirstPaymentExpired)
    }

    /// Records the provider's confirmation of the recurring subscription.
    ///
    /// Idempotent: a repeated completion event carrying the same id skips.
    /// A different id for an already-confirmed subscription is refused,
    /// the external subscription id is immutable once set.
    pub fn confirm_checkout(
        &mut self,
        external_subscription_id: String,
        external_customer_id: Option<String>,
    ) -> Result<Transition, DomainError> {
        if let Some(existing) = &self.external_subscription_id {
            if *existing == external_subscription_id {
                return Ok(Transition::Skipped);
            }
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Subscription {} is already linked to {}, refusing relink to {}",
                    self.id, existing, external_subscription_id
                ),
            ));
        }
        let from = self.status;
        self.external_subscription_id = Some(external_subscription_id);
        if let Some(customer_id) = external_customer_id {
            self.external_customer_id.get_or_insert(customer_id);
        }
        self.updated_at = Timestamp::now();
        Ok(Transition::Applied { from })
    }

    /// Stores the checkout session reference returned by the provider.
    pub fn set_checkout_session_ref(&mut self, session_ref: String) {
        self.checkout_session_ref = Some(session_ref);
        self.updated_at = Timestamp::now();
    }

    /// Transition to a new status using the state machine.
    fn apply(&mut self, target: SubscriptionStatus) -> Result<Transition, DomainError> {
        let from = self.status;
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition subscription {} from {} to {}",
                    self.id, self.status, target
                ),
            )
        })?;
        self.updated_at = Timestamp::now();
        Ok(Transition::Applied { from })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user_id() -> UserId {
        UserId::new("user-123").unwrap()
    }

    fn pending_subscription() -> Subscription {
        Subscription::new_enrollment(test_user_id(), "cus_123".to_string())
    }

    fn active_subscription() -> Subscription {
        let mut sub = pending_subscription();
        sub.activate().unwrap();
        sub
    }

    // Construction tests

    #[test]
    fn new_enrollment_starts_pending() {
        let sub = pending_subscription();
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.external_customer_id, Some("cus_123".to_string()));
        assert!(sub.external_subscription_id.is_none());
        assert!(sub.checkout_session_ref.is_none());
        assert_eq!(sub.version, 0);
    }

    #[test]
    fn pending_subscription_has_no_access() {
        assert!(!pending_subscription().has_access());
    }

    // Lifecycle transition tests

    #[test]
    fn pending_can_activate() {
        let mut sub = pending_subscription();
        let result = sub.activate().unwrap();
        assert!(result.changed());
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.has_access());
    }

    #[test]
    fn activate_is_idempotent() {
        let mut sub = active_subscription();
        let result = sub.activate().unwrap();
        assert_eq!(result, Transition::Skipped);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn active_can_cancel() {
        let mut sub = active_subscription();
        let result = sub.cancel().unwrap();
        assert!(result.changed());
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
    }

    #[test]
    fn pending_cannot_cancel() {
        let mut sub = pending_subscription();
        assert!(sub.cancel().is_err());
        assert_eq!(sub.status, SubscriptionStatus::Pending);
    }

    #[test]
    fn canceled_can_reactivate() {
        let mut sub = active_subscription();
        sub.cancel().unwrap();
        let result = sub.activate().unwrap();
        assert!(result.changed());
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn active_can_lapse() {
        let mut sub = active_subscription();
        let result = sub.lapse().unwrap();
        assert!(result.changed());
        assert_eq!(sub.status, SubscriptionStatus::Expired);
    }

    // First-payment expiry guard

    #[test]
    fn pending_with_no_payments_can_expire_first_payment() {
        let mut sub = pending_subscription();
        let result = sub.expire_first_payment(0).unwrap();
        assert!(result.changed());
        assert_eq!(sub.status, SubscriptionStatus::FirstPaymentExpired);
    }

    #[test]
    fn pending_with_payments_refuses_first_payment_expiry() {
        let mut sub = pending_subscription();
        let err = sub.expire_first_payment(2).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(sub.status, SubscriptionStatus::Pending);
    }

    #[test]
    fn active_refuses_first_payment_expiry() {
        let mut sub = active_subscription();
        assert!(sub.expire_first_payment(0).is_err());
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn first_payment_expiry_is_idempotent() {
        let mut sub = pending_subscription();
        sub.expire_first_payment(0).unwrap();
        let result = sub.expire_first_payment(0).unwrap();
        assert_eq!(result, Transition::Skipped);
    }

    // Checkout confirmation (external id immutability)

    #[test]
    fn confirm_checkout_sets_external_ids() {
        let mut sub = pending_subscription();
        let result = sub
            .confirm_checkout("sub_ext_1".to_string(), Some("cus_456".to_string()))
            .unwrap();
        assert!(result.changed());
        assert_eq!(sub.external_subscription_id, Some("sub_ext_1".to_string()));
        // Customer id set at enrollment wins
        assert_eq!(sub.external_customer_id, Some("cus_123".to_string()));
        assert_eq!(sub.status, SubscriptionStatus::Pending);
    }

    #[test]
    fn confirm_checkout_same_id_skips() {
        let mut sub = pending_subscription();
        sub.confirm_checkout("sub_ext_1".to_string(), None).unwrap();
        let result = sub.confirm_checkout("sub_ext_1".to_string(), None).unwrap();
        assert_eq!(result, Transition::Skipped);
    }

    #[test]
    fn confirm_checkout_refuses_relink() {
        let mut sub = pending_subscription();
        sub.confirm_checkout("sub_ext_1".to_string(), None).unwrap();
        let err = sub.confirm_checkout("sub_ext_2".to_string(), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(sub.external_subscription_id, Some("sub_ext_1".to_string()));
    }
}
