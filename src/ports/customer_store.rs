//! Customer mapping store port.
//!
//! Local authority for the internal-user to billing-customer mapping.
//! A unique constraint on `user_id` resolves concurrent creation races
//! without holding a lock across the provider call.

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Mapping of an internal user to the provider's billing customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerMapping {
    pub user_id: UserId,
    pub external_customer_id: String,
    pub created_at: Timestamp,
}

impl CustomerMapping {
    /// Creates a new mapping.
    pub fn new(user_id: UserId, external_customer_id: impl Into<String>) -> Self {
        Self {
            user_id,
            external_customer_id: external_customer_id.into(),
            created_at: Timestamp::now(),
        }
    }
}

/// Result of inserting a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The mapping was written.
    Inserted,
    /// A mapping for this user already exists; the unique constraint
    /// rejected the write. Callers re-read and use the winner.
    AlreadyMapped,
}

/// Port for the user-to-customer mapping store.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Find the mapping for a user.
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CustomerMapping>, DomainError>;

    /// Insert a mapping; the unique constraint on `user_id` decides races.
    async fn insert(&self, mapping: CustomerMapping) -> Result<InsertOutcome, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn CustomerStore) {}
    }
}
