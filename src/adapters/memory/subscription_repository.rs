//! In-memory subscription repository.
//!
//! Backs the test suites and local runs. Mirrors the Postgres adapter's
//! guarantees: the one-current-row-per-user constraint and the
//! optimistic-concurrency check on `version`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, UserId};
use crate::domain::membership::Subscription;
use crate::ports::SubscriptionRepository;

/// In-memory implementation of [`SubscriptionRepository`].
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    rows: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        let conflict = rows
            .values()
            .any(|existing| existing.user_id == subscription.user_id && existing.is_current());
        if conflict {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                format!(
                    "User {} already has a current subscription",
                    subscription.user_id
                ),
            ));
        }
        rows.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<Subscription, DomainError> {
        let mut rows = self.rows.write().await;
        let stored = rows.get(&subscription.id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription not found: {}", subscription.id),
            )
        })?;
        if stored.version != subscription.version {
            return Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                format!(
                    "Subscription {} was modified concurrently (expected version {}, found {})",
                    subscription.id, subscription.version, stored.version
                ),
            ));
        }
        let mut updated = subscription.clone();
        updated.version += 1;
        rows.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let rows = self.rows.read().await;
        Ok(rows.get(id).cloned())
    }

    async fn find_current_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|s| s.user_id == *user_id && s.is_current())
            .cloned())
    }

    async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|s| s.external_subscription_id.as_deref() == Some(external_subscription_id))
            .cloned())
    }

    async fn find_by_external_customer_id(
        &self,
        external_customer_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|s| s.external_customer_id.as_deref() == Some(external_customer_id))
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn find_by_checkout_session(
        &self,
        session_ref: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|s| s.checkout_session_ref.as_deref() == Some(session_ref))
            .cloned())
    }

    async fn list_page(
        &self,
        after: Option<SubscriptionId>,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows = self.rows.read().await;
        let mut page: Vec<Subscription> = rows
            .values()
            .filter(|s| match after {
                Some(cursor) => s.id > cursor,
                None => true,
            })
            .cloned()
            .collect();
        page.sort_by_key(|s| s.id);
        page.truncate(limit as usize);
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::membership::SubscriptionStatus;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn save_rejects_second_current_subscription() {
        let repo = InMemorySubscriptionRepository::new();
        let first = Subscription::new_enrollment(user("u1"), "cus_1".to_string());
        repo.save(&first).await.unwrap();

        let second = Subscription::new_enrollment(user("u1"), "cus_1".to_string());
        let err = repo.save(&second).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SubscriptionExists);
    }

    #[tokio::test]
    async fn save_allows_reenrollment_after_terminal_row() {
        let repo = InMemorySubscriptionRepository::new();
        let mut first = Subscription::new_enrollment(user("u1"), "cus_1".to_string());
        first.expire_first_payment(0).unwrap();
        repo.save(&first).await.unwrap();

        let second = Subscription::new_enrollment(user("u1"), "cus_1".to_string());
        repo.save(&second).await.unwrap();

        let current = repo.find_current_by_user_id(&user("u1")).await.unwrap();
        assert_eq!(current.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let repo = InMemorySubscriptionRepository::new();
        let mut sub = Subscription::new_enrollment(user("u1"), "cus_1".to_string());
        repo.save(&sub).await.unwrap();

        sub.activate().unwrap();
        repo.update(&sub).await.unwrap();

        let stored = repo.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn update_rejects_stale_version() {
        let repo = InMemorySubscriptionRepository::new();
        let sub = Subscription::new_enrollment(user("u1"), "cus_1".to_string());
        repo.save(&sub).await.unwrap();

        // First writer wins
        let mut winner = sub.clone();
        winner.activate().unwrap();
        repo.update(&winner).await.unwrap();

        // Stale copy still carries version 0
        let mut loser = sub.clone();
        loser.activate().unwrap();
        let err = repo.update(&loser).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConcurrentModification);
    }

    #[tokio::test]
    async fn list_page_pages_by_id_cursor() {
        let repo = InMemorySubscriptionRepository::new();
        for i in 0..5 {
            let mut sub =
                Subscription::new_enrollment(user(&format!("u{}", i)), "cus".to_string());
            // Terminal rows so the current-subscription guard stays out of the way
            sub.expire_first_payment(0).unwrap();
            repo.save(&sub).await.unwrap();
        }

        let first = repo.list_page(None, 2).await.unwrap();
        assert_eq!(first.len(), 2);

        let second = repo.list_page(Some(first[1].id), 10).await.unwrap();
        assert_eq!(second.len(), 3);
        assert!(second.iter().all(|s| s.id > first[1].id));
    }

    #[tokio::test]
    async fn find_by_external_customer_id_returns_most_recent() {
        let repo = InMemorySubscriptionRepository::new();
        let mut old = Subscription::new_enrollment(user("u1"), "cus_1".to_string());
        old.expire_first_payment(0).unwrap();
        old.created_at = old.created_at.minus_days(2);
        repo.save(&old).await.unwrap();

        let recent = Subscription::new_enrollment(user("u1"), "cus_1".to_string());
        repo.save(&recent).await.unwrap();

        let found = repo
            .find_by_external_customer_id("cus_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, recent.id);
    }
}
