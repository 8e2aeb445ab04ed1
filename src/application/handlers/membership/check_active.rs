//! CheckActiveHandler - the access-check query other services call.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::SubscriptionRepository;

/// Query handler answering "does this user have access right now".
///
/// Only an Active subscription grants access; Pending and lapsed rows do
/// not.
pub struct CheckActiveHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl CheckActiveHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn is_active(&self, user_id: &UserId) -> Result<bool, DomainError> {
        let subscription = self.repository.find_current_by_user_id(user_id).await?;
        Ok(subscription.map(|s| s.has_access()).unwrap_or(false))
    }
}
