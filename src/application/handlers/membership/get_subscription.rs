//! GetSubscriptionHandler - query for a user's current subscription.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::membership::Subscription;
use crate::ports::SubscriptionRepository;

/// Query handler returning the user's current subscription, if any.
pub struct GetSubscriptionHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl GetSubscriptionHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.repository.find_current_by_user_id(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionRepository;
    use crate::domain::membership::SubscriptionStatus;

    #[tokio::test]
    async fn returns_current_subscription() {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let user = UserId::new("u1").unwrap();
        let sub = Subscription::new_enrollment(user.clone(), "cus_1".to_string());
        repo.save(&sub).await.unwrap();

        let handler = GetSubscriptionHandler::new(repo);
        let found = handler.current_subscription(&user).await.unwrap().unwrap();
        assert_eq!(found.id, sub.id);
        assert_eq!(found.status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn returns_none_for_unknown_user() {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let handler = GetSubscriptionHandler::new(repo);

        let found = handler
            .current_subscription(&UserId::new("nobody").unwrap())
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
