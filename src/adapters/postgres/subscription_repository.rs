//! PostgreSQL implementation of SubscriptionRepository.
//!
//! Persistent storage for Subscription aggregates. Two schema-level
//! guarantees back the domain invariants:
//! - a partial unique index on `user_id` over current rows enforces one
//!   current subscription per user
//! - every update is conditional on `version`, which the statement bumps

use crate::domain::foundation::{
    DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::domain::membership::{Subscription, SubscriptionStatus};
use crate::ports::SubscriptionRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const CURRENT_ROW_CONSTRAINT: &str = "subscriptions_one_current_per_user";

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    /// Creates a new PostgresSubscriptionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: String,
    status: String,
    external_customer_id: Option<String>,
    external_subscription_id: Option<String>,
    checkout_session_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            status: parse_status(&row.status)?,
            external_customer_id: row.external_customer_id,
            external_subscription_id: row.external_subscription_id,
            checkout_session_ref: row.checkout_session_ref,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version.max(0) as u64,
        })
    }
}

fn parse_status(s: &str) -> Result<SubscriptionStatus, DomainError> {
    match s {
        "pending" => Ok(SubscriptionStatus::Pending),
        "active" => Ok(SubscriptionStatus::Active),
        "canceled" => Ok(SubscriptionStatus::Canceled),
        "expired" => Ok(SubscriptionStatus::Expired),
        "first_payment_expired" => Ok(SubscriptionStatus::FirstPaymentExpired),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid status value: {}", s),
        )),
    }
}

fn status_to_string(status: &SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Pending => "pending",
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::Canceled => "canceled",
        SubscriptionStatus::Expired => "expired",
        SubscriptionStatus::FirstPaymentExpired => "first_payment_expired",
    }
}

const SELECT_COLUMNS: &str = "id, user_id, status, external_customer_id, \
     external_subscription_id, checkout_session_ref, created_at, updated_at, version";

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, status, external_customer_id, external_subscription_id,
                checkout_session_ref, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_str())
        .bind(status_to_string(&subscription.status))
        .bind(&subscription.external_customer_id)
        .bind(&subscription.external_subscription_id)
        .bind(&subscription.checkout_session_ref)
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .bind(subscription.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some(CURRENT_ROW_CONSTRAINT) {
                    return DomainError::new(
                        ErrorCode::SubscriptionExists,
                        format!(
                            "User {} already has a current subscription",
                            subscription.user_id
                        ),
                    );
                }
            }
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to save subscription: {}", e),
            )
        })?;

        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<Subscription, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = $3,
                external_customer_id = $4,
                external_subscription_id = $5,
                checkout_session_ref = $6,
                updated_at = $7,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.version as i64)
        .bind(status_to_string(&subscription.status))
        .bind(&subscription.external_customer_id)
        .bind(&subscription.external_subscription_id)
        .bind(&subscription.checkout_session_ref)
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update subscription: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            // Either the row is gone or another writer got there first
            return match self.find_by_id(&subscription.id).await? {
                Some(stored) => Err(DomainError::new(
                    ErrorCode::ConcurrentModification,
                    format!(
                        "Subscription {} was modified concurrently (expected version {}, found {})",
                        subscription.id, subscription.version, stored.version
                    ),
                )),
                None => Err(DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription not found: {}", subscription.id),
                )),
            };
        }

        let mut updated = subscription.clone();
        updated.version += 1;
        Ok(updated)
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find subscription: {}", e),
            )
        })?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_current_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 AND status IN ('pending', 'active')",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find subscription: {}", e),
            )
        })?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE external_subscription_id = $1",
            SELECT_COLUMNS
        ))
        .bind(external_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find subscription: {}", e),
            )
        })?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_external_customer_id(
        &self,
        external_customer_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE external_customer_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(external_customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find subscription: {}", e),
            )
        })?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_checkout_session(
        &self,
        session_ref: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE checkout_session_ref = $1",
            SELECT_COLUMNS
        ))
        .bind(session_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find subscription: {}", e),
            )
        })?;

        row.map(Subscription::try_from).transpose()
    }

    async fn list_page(
        &self,
        after: Option<SubscriptionId>,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions \
             WHERE ($1::uuid IS NULL OR id > $1) \
             ORDER BY id ASC LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(after.map(|id| *id.as_uuid()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list subscriptions: {}", e),
            )
        })?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}
