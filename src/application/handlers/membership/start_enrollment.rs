//! StartEnrollmentHandler - command handler for starting a paid enrollment.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::foundation::{ErrorCode, UserId};
use crate::domain::membership::{MembershipError, Subscription};
use crate::ports::{CheckoutSessionRef, PaymentProvider, SubscriptionRepository};

use super::CustomerIdentityMapper;

/// Command to start a new enrollment.
#[derive(Debug, Clone)]
pub struct StartEnrollmentCommand {
    pub user_id: UserId,
    pub email: String,
}

/// Result of a started enrollment.
#[derive(Debug, Clone)]
pub struct EnrollmentStarted {
    pub subscription: Subscription,
    pub checkout_session: CheckoutSessionRef,
}

/// Handler for starting a paid enrollment.
///
/// Creates a Pending subscription and hands back the provider's checkout
/// URL. The checkout call is not transactional with the local row: if it
/// fails the row stays Pending with no external subscription id, and the
/// sweep writes it off once the pending TTL passes.
pub struct StartEnrollmentHandler {
    repository: Arc<dyn SubscriptionRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    customer_identity: Arc<CustomerIdentityMapper>,
}

impl StartEnrollmentHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        customer_identity: Arc<CustomerIdentityMapper>,
    ) -> Self {
        Self {
            repository,
            payment_provider,
            customer_identity,
        }
    }

    pub async fn handle(
        &self,
        cmd: StartEnrollmentCommand,
    ) -> Result<EnrollmentStarted, MembershipError> {
        // 1. Enrollment guard: one current subscription per user
        if let Some(existing) = self
            .repository
            .find_current_by_user_id(&cmd.user_id)
            .await?
        {
            info!(
                user_id = %cmd.user_id,
                subscription_id = %existing.id,
                status = %existing.status,
                "Enrollment refused, user already has a current subscription"
            );
            return Err(MembershipError::already_enrolled(cmd.user_id));
        }

        // 2. Resolve the billing customer
        let customer_id = self
            .customer_identity
            .get_or_create(&cmd.user_id, &cmd.email)
            .await?;

        // 3. Create the Pending row; the unique constraint catches a
        //    concurrent enrollment that slipped past the guard
        let mut subscription = Subscription::new_enrollment(cmd.user_id.clone(), customer_id);
        self.repository.save(&subscription).await.map_err(|e| {
            if e.code == ErrorCode::SubscriptionExists {
                MembershipError::already_enrolled(cmd.user_id.clone())
            } else {
                MembershipError::from(e)
            }
        })?;

        // 4. Ask the provider for a checkout session
        let checkout_session = self
            .payment_provider
            .create_checkout_session(
                subscription
                    .external_customer_id
                    .as_deref()
                    .unwrap_or_default(),
            )
            .await
            .map_err(|e| {
                warn!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Checkout session creation failed, subscription stays pending"
                );
                MembershipError::payment_failed(e.message)
            })?;

        // 5. Persist the session reference so the completion event resolves
        subscription.set_checkout_session_ref(checkout_session.id.clone());
        let subscription = self.repository.update(&subscription).await?;

        info!(
            user_id = %cmd.user_id,
            subscription_id = %subscription.id,
            session = %checkout_session.id,
            "Enrollment started"
        );

        Ok(EnrollmentStarted {
            subscription,
            checkout_session,
        })
    }
}
