//! Job store (component D) — the persistent queue's claim/complete/fail protocol.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::common::{AppError, JobId};

use super::model::{EnqueueOutcome, Job};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn enqueue(
        &self,
        kind: &str,
        run_at: DateTime<Utc>,
        payload: serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Result<EnqueueOutcome, AppError>;

    async fn claim(
        &self,
        worker_id: &str,
        batch_size: i64,
        lock_duration: Duration,
    ) -> Result<Vec<Job>, AppError>;

    async fn complete(&self, job_id: JobId, worker_id: &str) -> Result<(), AppError>;

    async fn fail(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        delay: Duration,
    ) -> Result<(), AppError>;

    /// Marks the pending job matching `idempotency_key` completed without
    /// running it — used by the write-time scheduler to cancel an obsolete
    /// reminder/nudge (§4.G-i).
    async fn cancel_by_idempotency_key(&self, kind: &str, idempotency_key: &str) -> Result<(), AppError>;

    async fn pending_counts(&self) -> Result<HashMap<String, i64>, AppError>;
}

pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn enqueue(
        &self,
        kind: &str,
        run_at: DateTime<Utc>,
        payload: serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Result<EnqueueOutcome, AppError> {
        if let Some(key) = idempotency_key {
            if let Some(existing) = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM jobs WHERE kind = $1 AND idempotency_key = $2 AND completed_at IS NULL",
            )
            .bind(kind)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?
            {
                return Ok(EnqueueOutcome::Duplicate(existing));
            }
        }

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (kind, payload, run_at, idempotency_key)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kind, idempotency_key) WHERE idempotency_key IS NOT NULL AND completed_at IS NULL
            DO UPDATE SET kind = EXCLUDED.kind
            RETURNING id
            "#,
        )
        .bind(kind)
        .bind(payload)
        .bind(run_at)
        .bind(idempotency_key)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(EnqueueOutcome::Created(id))
    }

    async fn claim(
        &self,
        worker_id: &str,
        batch_size: i64,
        lock_duration: Duration,
    ) -> Result<Vec<Job>, AppError> {
        // A CTE selects claimable rows under FOR UPDATE SKIP LOCKED so
        // concurrent claimants never block each other, then stamps the lock
        // in the same statement — the claim is therefore atomic (§4.D).
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            WITH claimable AS (
                SELECT id FROM jobs
                WHERE completed_at IS NULL
                  AND run_at <= now()
                  AND (locked_by IS NULL OR locked_until < now())
                ORDER BY run_at ASC, id ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET locked_by = $2,
                locked_until = now() + ($3::text || ' seconds')::interval,
                updated_at = now()
            FROM claimable
            WHERE jobs.id = claimable.id
            RETURNING jobs.*
            "#,
        )
        .bind(batch_size)
        .bind(worker_id)
        .bind(lock_duration.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(jobs)
    }

    async fn complete(&self, job_id: JobId, worker_id: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET completed_at = now(), locked_by = NULL, locked_until = NULL, updated_at = now()
            WHERE id = $1 AND locked_by = $2
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConstraintViolation(format!(
                "job {} is not locked by {}",
                job_id, worker_id
            )));
        }
        Ok(())
    }

    async fn fail(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        delay: Duration,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET attempts = attempts + 1,
                last_error = $3,
                run_at = now() + ($4::text || ' seconds')::interval,
                locked_by = NULL,
                locked_until = NULL,
                updated_at = now()
            WHERE id = $1 AND locked_by = $2
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(error)
        .bind(delay.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConstraintViolation(format!(
                "job {} is not locked by {}",
                job_id, worker_id
            )));
        }
        Ok(())
    }

    async fn cancel_by_idempotency_key(&self, kind: &str, idempotency_key: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE jobs SET completed_at = now(), updated_at = now() \
             WHERE kind = $1 AND idempotency_key = $2 AND completed_at IS NULL",
        )
        .bind(kind)
        .bind(idempotency_key)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn pending_counts(&self) -> Result<HashMap<String, i64>, AppError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT kind, count(*) FROM jobs WHERE completed_at IS NULL GROUP BY kind",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().collect())
    }
}
