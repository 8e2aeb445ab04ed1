//! Subscription status state machine.
//!
//! Defines all possible subscription states and valid transitions
//! in the paid-membership lifecycle.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Membership subscription status.
///
/// Represents the current state of a user's subscription in the
/// payment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Initial state awaiting first payment.
    /// No access until payment completes.
    Pending,

    /// Fully paid subscription with complete access.
    Active,

    /// Provider reported the subscription canceled or unpaid.
    /// Re-activated by reconciliation if a late payment covers now.
    Canceled,

    /// Lapsed without an explicit provider cancellation: the sweep
    /// found no payment covering now. Re-activatable the same way.
    Expired,

    /// The initial payment attempt expired before any payment landed.
    /// Terminal for this enrollment attempt; the user starts a new one.
    FirstPaymentExpired,
}

impl SubscriptionStatus {
    /// Returns true if this status grants access to member features.
    pub fn grants_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    /// Returns true if this status counts as the user's current enrollment.
    ///
    /// At most one subscription per user may be in a current state; the
    /// enrollment guard checks this before creating a new row.
    pub fn is_current(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Pending | SubscriptionStatus::Active
        )
    }

    /// Returns true if this status is a lapsed state the sweep may re-activate.
    pub fn is_lapsed(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Canceled | SubscriptionStatus::Expired
        )
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::FirstPaymentExpired => "first_payment_expired",
        };
        write!(f, "{}", s)
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Active)
                | (Pending, FirstPaymentExpired)
            // From ACTIVE
                | (Active, Canceled)
                | (Active, Expired)
            // Lapsed states re-activate on a late covering payment
                | (Canceled, Active)
                | (Expired, Active)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, FirstPaymentExpired],
            Active => vec![Canceled, Expired],
            Canceled => vec![Active],
            Expired => vec![Active],
            FirstPaymentExpired => vec![],
        }
    }
}
