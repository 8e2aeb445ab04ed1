//! PostgreSQL implementation of PaymentLedger.
//!
//! Append-only table; no UPDATE or DELETE statements exist here. The
//! unique index on `external_event_id` makes the append idempotent.

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, SubscriptionId, Timestamp,
};
use crate::domain::membership::{Payment, PaymentStatus};
use crate::ports::{AppendOutcome, PaymentLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const EVENT_ID_CONSTRAINT: &str = "payments_external_event_id_key";

/// PostgreSQL implementation of the PaymentLedger port.
pub struct PostgresPaymentLedger {
    pool: PgPool,
}

impl PostgresPaymentLedger {
    /// Creates a new PostgresPaymentLedger with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_event_id(&self, external_event_id: &str) -> Result<Payment, DomainError> {
        let row: PaymentRow = sqlx::query_as(
            r#"
            SELECT id, subscription_id, external_event_id, status, amount, currency,
                   period_start, period_end, paid_at, created_at
            FROM payments
            WHERE external_event_id = $1
            "#,
        )
        .bind(external_event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find payment: {}", e),
            )
        })?;

        Payment::try_from(row)
    }
}

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    subscription_id: Uuid,
    external_event_id: String,
    status: String,
    amount: i64,
    currency: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    paid_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "paid" => PaymentStatus::Paid,
            other => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid payment status: {}", other),
                ))
            }
        };
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            external_event_id: row.external_event_id,
            status,
            amount: row.amount,
            currency: row.currency,
            period_start: Timestamp::from_datetime(row.period_start),
            period_end: Timestamp::from_datetime(row.period_end),
            paid_at: Timestamp::from_datetime(row.paid_at),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn status_to_string(status: &PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Paid => "paid",
    }
}

#[async_trait]
impl PaymentLedger for PostgresPaymentLedger {
    async fn append(&self, payment: Payment) -> Result<AppendOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, subscription_id, external_event_id, status, amount, currency,
                period_start, period_end, paid_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.subscription_id.as_uuid())
        .bind(&payment.external_event_id)
        .bind(status_to_string(&payment.status))
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.period_start.as_datetime())
        .bind(payment.period_end.as_datetime())
        .bind(payment.paid_at.as_datetime())
        .bind(payment.created_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(AppendOutcome::Recorded(payment)),
            Err(sqlx::Error::Database(db_err))
                if db_err.constraint() == Some(EVENT_ID_CONSTRAINT) =>
            {
                // A row for this event already exists; return it untouched
                let existing = self.find_by_event_id(&payment.external_event_id).await?;
                Ok(AppendOutcome::AlreadyRecorded(existing))
            }
            Err(e) => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to append payment: {}", e),
            )),
        }
    }

    async fn has_payment_covering(
        &self,
        subscription_id: &SubscriptionId,
        instant: Timestamp,
    ) -> Result<bool, DomainError> {
        let covered: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM payments
                WHERE subscription_id = $1
                  AND period_start <= $2
                  AND period_end >= $2
            )
            "#,
        )
        .bind(subscription_id.as_uuid())
        .bind(instant.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to check payment coverage: {}", e),
            )
        })?;

        Ok(covered)
    }

    async fn payments_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Payment>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, subscription_id, external_event_id, status, amount, currency,
                   period_start, period_end, paid_at, created_at
            FROM payments
            WHERE subscription_id = $1
            ORDER BY period_start ASC
            "#,
        )
        .bind(subscription_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list payments: {}", e),
            )
        })?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}
