//! PostgreSQL implementation of CustomerStore.

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{CustomerMapping, CustomerStore, InsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const USER_ID_CONSTRAINT: &str = "customer_mappings_user_id_key";

/// PostgreSQL implementation of the CustomerStore port.
///
/// The unique constraint on `user_id` is what makes concurrent
/// get-or-create calls converge on a single billing customer.
pub struct PostgresCustomerStore {
    pool: PgPool,
}

impl PostgresCustomerStore {
    /// Creates a new PostgresCustomerStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerMappingRow {
    user_id: String,
    external_customer_id: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerMappingRow> for CustomerMapping {
    type Error = DomainError;

    fn try_from(row: CustomerMappingRow) -> Result<Self, Self::Error> {
        Ok(CustomerMapping {
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            external_customer_id: row.external_customer_id,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl CustomerStore for PostgresCustomerStore {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CustomerMapping>, DomainError> {
        let row: Option<CustomerMappingRow> = sqlx::query_as(
            r#"
            SELECT user_id, external_customer_id, created_at
            FROM customer_mappings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find customer mapping: {}", e),
            )
        })?;

        row.map(CustomerMapping::try_from).transpose()
    }

    async fn insert(&self, mapping: CustomerMapping) -> Result<InsertOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO customer_mappings (user_id, external_customer_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(mapping.user_id.as_str())
        .bind(&mapping.external_customer_id)
        .bind(mapping.created_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db_err))
                if db_err.constraint() == Some(USER_ID_CONSTRAINT) =>
            {
                Ok(InsertOutcome::AlreadyMapped)
            }
            Err(e) => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert customer mapping: {}", e),
            )),
        }
    }
}
