//! Reconciliation decision rules.
//!
//! The sweep re-derives the correct status of every subscription purely
//! from the payment ledger. The decision itself is a pure function; the
//! application layer feeds it ledger facts and applies the outcome.

use chrono::Duration;
use serde::Serialize;

use crate::domain::foundation::Timestamp;

use super::{Subscription, SubscriptionStatus};

/// Corrective action the sweep should apply to one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    /// A payment covers now; the subscription should be active.
    Activate,
    /// No payment covers now; the active subscription has lapsed.
    Lapse,
    /// A pending enrollment outlived its checkout window with no payment.
    ExpireFirstPayment,
}

/// Decides the corrective action for one subscription, if any.
///
/// `has_coverage` and `payment_count` are facts read from the ledger for
/// this subscription. `pending_ttl` bounds how long an enrollment may sit
/// in Pending before it is written off as a failed first payment.
pub fn decide_sweep_action(
    subscription: &Subscription,
    has_coverage: bool,
    payment_count: usize,
    now: Timestamp,
    pending_ttl: Duration,
) -> Option<SweepAction> {
    match subscription.status {
        SubscriptionStatus::Pending => {
            if has_coverage {
                Some(SweepAction::Activate)
            } else if payment_count == 0
                && now.duration_since(&subscription.created_at) > pending_ttl
            {
                Some(SweepAction::ExpireFirstPayment)
            } else {
                None
            }
        }
        SubscriptionStatus::Active => {
            if has_coverage {
                None
            } else {
                Some(SweepAction::Lapse)
            }
        }
        SubscriptionStatus::Canceled | SubscriptionStatus::Expired => {
            if has_coverage {
                Some(SweepAction::Activate)
            } else {
                None
            }
        }
        SubscriptionStatus::FirstPaymentExpired => None,
    }
}

/// Transition counts for one sweep run, reported for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Subscriptions examined.
    pub scanned: u64,
    /// Lapsed or pending subscriptions moved to active.
    pub activated: u64,
    /// Active subscriptions with no coverage moved to expired.
    pub lapsed: u64,
    /// Stale pending enrollments written off.
    pub first_payment_expired: u64,
    /// Subscriptions skipped because of a per-row failure.
    pub failed: u64,
}

impl SweepSummary {
    /// Total transitions applied by the run.
    pub fn transitions(&self) -> u64 {
        self.activated + self.lapsed + self.first_payment_expired
    }
}
