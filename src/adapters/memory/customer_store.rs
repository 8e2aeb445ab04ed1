//! In-memory customer mapping store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{CustomerMapping, CustomerStore, InsertOutcome};

/// In-memory implementation of [`CustomerStore`].
#[derive(Default)]
pub struct InMemoryCustomerStore {
    rows: Arc<RwLock<HashMap<UserId, CustomerMapping>>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CustomerMapping>, DomainError> {
        let rows = self.rows.read().await;
        Ok(rows.get(user_id).cloned())
    }

    async fn insert(&self, mapping: CustomerMapping) -> Result<InsertOutcome, DomainError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&mapping.user_id) {
            return Ok(InsertOutcome::AlreadyMapped);
        }
        rows.insert(mapping.user_id.clone(), mapping);
        Ok(InsertOutcome::Inserted)
    }
}
