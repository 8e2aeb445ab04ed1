//! CustomerIdentityMapper - resolves internal users to billing customers.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::foundation::UserId;
use crate::domain::membership::MembershipError;
use crate::ports::{CustomerMapping, CustomerStore, InsertOutcome, PaymentProvider};

/// Resolves the billing customer for an internal user, creating it lazily.
///
/// Lookup order: the local store is the authority; absent a local mapping
/// the provider is queried by email so the same person never ends up with
/// two billing identities, and only then is a new customer created.
///
/// Concurrent calls for the same user converge on one customer id via the
/// store's unique constraint; no lock is held across the provider call.
pub struct CustomerIdentityMapper {
    store: Arc<dyn CustomerStore>,
    provider: Arc<dyn PaymentProvider>,
}

impl CustomerIdentityMapper {
    pub fn new(store: Arc<dyn CustomerStore>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { store, provider }
    }

    /// Returns the external customer id for the user, creating the billing
    /// customer if necessary.
    ///
    /// # Errors
    ///
    /// - `AmbiguousExternalCustomer` if the provider holds more than one
    ///   customer for the email
    /// - `PaymentFailed` if a provider call fails
    pub async fn get_or_create(
        &self,
        user_id: &UserId,
        email: &str,
    ) -> Result<String, MembershipError> {
        if let Some(mapping) = self.store.find_by_user_id(user_id).await? {
            return Ok(mapping.external_customer_id);
        }

        let mut candidates = self
            .provider
            .find_customers_by_email(email)
            .await
            .map_err(|e| MembershipError::payment_failed(e.message))?;

        let customer_id = match candidates.len() {
            0 => {
                let customer = self
                    .provider
                    .create_customer(user_id, email)
                    .await
                    .map_err(|e| MembershipError::payment_failed(e.message))?;
                info!(user_id = %user_id, customer_id = %customer.id, "Created billing customer");
                customer.id
            }
            1 => candidates.remove(0).id,
            n => {
                warn!(user_id = %user_id, matches = n, "Ambiguous billing customer lookup");
                return Err(MembershipError::ambiguous_customer(email, n));
            }
        };

        match self
            .store
            .insert(CustomerMapping::new(user_id.clone(), customer_id.clone()))
            .await?
        {
            InsertOutcome::Inserted => Ok(customer_id),
            InsertOutcome::AlreadyMapped => {
                // Lost a concurrent race; the winner's mapping is authoritative
                let mapping = self.store.find_by_user_id(user_id).await?.ok_or_else(|| {
                    MembershipError::infrastructure(format!(
                        "Customer mapping for {} vanished after insert conflict",
                        user_id
                    ))
                })?;
                Ok(mapping.external_customer_id)
            }
        }
    }
}
