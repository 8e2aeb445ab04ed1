//! BillingPortalHandler - hands members a provider-hosted billing portal.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::membership::MembershipError;
use crate::ports::{PaymentProvider, PortalSession, SubscriptionRepository};

/// Creates a provider-hosted billing portal session for a member.
pub struct BillingPortalHandler {
    repository: Arc<dyn SubscriptionRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl BillingPortalHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            repository,
            payment_provider,
        }
    }

    pub async fn create_session(
        &self,
        user_id: &UserId,
        return_url: &str,
    ) -> Result<PortalSession, MembershipError> {
        let subscription = self
            .repository
            .find_current_by_user_id(user_id)
            .await?
            .ok_or_else(|| MembershipError::not_found_for_user(user_id.clone()))?;

        let customer_id = subscription
            .external_customer_id
            .as_deref()
            .ok_or_else(|| {
                MembershipError::invalid_state(
                    subscription.status.to_string(),
                    "open the billing portal for",
                )
            })?;

        self.payment_provider
            .create_portal_session(customer_id, return_url)
            .await
            .map_err(|e| MembershipError::payment_failed(e.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionRepository;
    use crate::domain::membership::Subscription;
    use crate::ports::{CheckoutSessionRef, PaymentError, ProviderCustomer};
    use async_trait::async_trait;

    struct FakeProvider;

    #[async_trait]
    impl PaymentProvider for FakeProvider {
        async fn create_customer(
            &self,
            _user_id: &UserId,
            _email: &str,
        ) -> Result<ProviderCustomer, PaymentError> {
            Err(PaymentError::provider("not used in this test"))
        }

        async fn find_customers_by_email(
            &self,
            _email: &str,
        ) -> Result<Vec<ProviderCustomer>, PaymentError> {
            Ok(vec![])
        }

        async fn create_checkout_session(
            &self,
            _customer_id: &str,
        ) -> Result<CheckoutSessionRef, PaymentError> {
            Err(PaymentError::provider("not used in this test"))
        }

        async fn create_portal_session(
            &self,
            customer_id: &str,
            return_url: &str,
        ) -> Result<PortalSession, PaymentError> {
            Ok(PortalSession {
                id: format!("bps_{}", customer_id),
                url: format!("https://portal.example.com/?return={}", return_url),
            })
        }
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn creates_portal_session_for_member() {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let mut sub = Subscription::new_enrollment(user("u1"), "cus_1".to_string());
        sub.activate().unwrap();
        repo.save(&sub).await.unwrap();

        let handler = BillingPortalHandler::new(repo, Arc::new(FakeProvider));
        let session = handler
            .create_session(&user("u1"), "https://app.example.com/account")
            .await
            .unwrap();
        assert_eq!(session.id, "bps_cus_1");
    }

    #[tokio::test]
    async fn non_member_gets_not_found() {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let handler = BillingPortalHandler::new(repo, Arc::new(FakeProvider));

        let err = handler
            .create_session(&user("nobody"), "https://app.example.com/account")
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::NotFoundForUser(_)));
    }
}
