//! Subscription repository port.
//!
//! Defines the contract for persisting and retrieving Subscription
//! aggregates. Implementations must ensure:
//! - at most one current (Pending or Active) row per user, via a partial
//!   unique constraint
//! - an optimistic-concurrency check on `version` for every update

use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::domain::membership::Subscription;
use async_trait::async_trait;

/// Repository port for Subscription aggregate persistence.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Save a new subscription row.
    ///
    /// # Errors
    ///
    /// - `SubscriptionExists` if the user already has a current subscription
    /// - `DatabaseError` on persistence failure
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Update an existing subscription.
    ///
    /// The write succeeds only when the stored row still carries
    /// `subscription.version`; the stored version is bumped atomically and
    /// the updated row is returned.
    ///
    /// # Errors
    ///
    /// - `ConcurrentModification` if the row changed since it was read
    /// - `SubscriptionNotFound` if the row doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, subscription: &Subscription) -> Result<Subscription, DomainError>;

    /// Find a subscription by its id.
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Find the user's current (Pending or Active) subscription.
    ///
    /// This is the enrollment-guard lookup; at most one row qualifies.
    async fn find_current_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Find a subscription by the provider's subscription id.
    async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Find the most recent subscription linked to a billing customer.
    ///
    /// Fallback resolution for events that carry only a customer id.
    async fn find_by_external_customer_id(
        &self,
        external_customer_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Find a subscription by its checkout session reference.
    async fn find_by_checkout_session(
        &self,
        session_ref: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// List a page of subscriptions ordered by id.
    ///
    /// The sweep scans with this cursor so a crashed run resumes cleanly on
    /// the next tick instead of holding one unbounded transaction.
    async fn list_page(
        &self,
        after: Option<SubscriptionId>,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SubscriptionRepository) {}
    }
}
