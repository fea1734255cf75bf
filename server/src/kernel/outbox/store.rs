//! Webhook outbox store (component F) — enqueue and the drain-candidate query.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::common::{AppError, OutboxMessageId};

use super::model::OutboxMessage;

#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn enqueue(
        &self,
        kind: &str,
        destination: &str,
        body: serde_json::Value,
        idempotency_key: &str,
    ) -> Result<(), AppError>;

    /// Atomically selects deliverable rows and leases them for
    /// `lease_secs` (by pushing `next_attempt_at` forward), so a second
    /// concurrent drainer can't pick up the same row mid-delivery. A crash
    /// mid-flight simply lets the lease expire and the row becomes
    /// deliverable again — at-least-once, not exactly-once, by design.
    async fn claim_batch(&self, batch_size: i64, lease_secs: i64) -> Result<Vec<OutboxMessage>, AppError>;

    async fn mark_delivered(&self, id: OutboxMessageId, status: i32) -> Result<(), AppError>;

    async fn mark_dead_letter(&self, id: OutboxMessageId, status: Option<i32>, error: &str) -> Result<(), AppError>;

    async fn mark_retry(
        &self,
        id: OutboxMessageId,
        status: Option<i32>,
        error: &str,
        next_attempt_at: chrono::DateTime<Utc>,
    ) -> Result<(), AppError>;
}

pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn enqueue(
        &self,
        kind: &str,
        destination: &str,
        body: serde_json::Value,
        idempotency_key: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO outbox_messages (kind, destination, body, idempotency_key)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kind, idempotency_key) DO NOTHING
            "#,
        )
        .bind(kind)
        .bind(destination)
        .bind(body)
        .bind(idempotency_key)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn claim_batch(&self, batch_size: i64, lease_secs: i64) -> Result<Vec<OutboxMessage>, AppError> {
        sqlx::query_as::<_, OutboxMessage>(
            r#"
            WITH claimable AS (
                SELECT id FROM outbox_messages
                WHERE delivered_at IS NULL AND dead_letter = false AND next_attempt_at <= now()
                ORDER BY next_attempt_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE outbox_messages
            SET next_attempt_at = now() + ($2::text || ' seconds')::interval, updated_at = now()
            FROM claimable
            WHERE outbox_messages.id = claimable.id
            RETURNING outbox_messages.*
            "#,
        )
        .bind(batch_size)
        .bind(lease_secs)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn mark_delivered(&self, id: OutboxMessageId, status: i32) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE outbox_messages SET delivered_at = now(), last_status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn mark_dead_letter(&self, id: OutboxMessageId, status: Option<i32>, error: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE outbox_messages SET dead_letter = true, last_status = $2, last_error = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: OutboxMessageId,
        status: Option<i32>,
        error: &str,
        next_attempt_at: chrono::DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE outbox_messages SET attempts = attempts + 1, last_status = $2, last_error = $3, \
             next_attempt_at = $4, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}
