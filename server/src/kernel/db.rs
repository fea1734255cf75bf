//! Persistence adapter (component A) — pool setup and the transaction scope.
//!
//! `with_transaction` is the single place that understands Postgres
//! serialization failures (SQLSTATE 40001): it retries the closure a small
//! bounded number of times with jittered backoff before surfacing
//! `AppError::StorageUnavailable` to the caller. Any other database error is
//! not retried here — `AppError::from(sqlx::Error)` already classifies
//! constraint violations as non-retryable.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::AppError;

const MAX_SERIALIZATION_RETRIES: u32 = 3;
const SERIALIZATION_FAILURE_SQLSTATE: &str = "40001";

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Runs `f` inside a transaction, committing on `Ok` and rolling back on `Err`.
/// Retries automatically on serialization failures with jittered backoff.
pub async fn with_transaction<T, F, Fut>(pool: &PgPool, mut f: F) -> Result<T, AppError>
where
    F: FnMut(&mut Transaction<'_, Postgres>) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;

    loop {
        let mut tx = pool.begin().await.map_err(AppError::from)?;

        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await.map_err(AppError::from)?;
                return Ok(value);
            }
            Err(err) if is_serialization_failure(&err) && attempt < MAX_SERIALIZATION_RETRIES => {
                let _ = tx.rollback().await;
                attempt += 1;
                let jitter_ms = rand::thread_rng().gen_range(10..100);
                tokio::time::sleep(Duration::from_millis(jitter_ms * attempt as u64)).await;
                continue;
            }
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(err);
            }
        }
    }
}

fn is_serialization_failure(err: &AppError) -> bool {
    matches!(err, AppError::StorageUnavailable(msg) if msg.contains(SERIALIZATION_FAILURE_SQLSTATE))
}
