//! Per-recipient rate limiting (§4.H) — fixed window counter per
//! `(recipient, channel)`. Exceeding the limit defers the originating job by
//! re-enqueuing it with `delay = window_remaining` rather than emitting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

pub enum RateDecision {
    Proceed,
    Defer { delay: std::time::Duration },
}

fn bucket_start(now: DateTime<Utc>, window: std::time::Duration) -> DateTime<Utc> {
    let window_secs = window.as_secs().max(1) as i64;
    let epoch = now.timestamp();
    let bucket = (epoch / window_secs) * window_secs;
    DateTime::from_timestamp(bucket, 0).unwrap_or(now)
}

/// Increments the counter for the current window and decides whether the
/// caller may proceed. Must run inside the same transaction as the emit.
pub async fn check_and_increment(
    tx: &mut Transaction<'_, Postgres>,
    recipient: &str,
    channel: &str,
    window: std::time::Duration,
    limit: i32,
) -> Result<RateDecision> {
    let now = Utc::now();
    let bucket = bucket_start(now, window);

    let row: (i32,) = sqlx::query_as(
        r#"
        INSERT INTO rate_counters (recipient, channel, bucket_start, count)
        VALUES ($1, $2, $3, 1)
        ON CONFLICT (recipient, channel, bucket_start) DO UPDATE
        SET count = rate_counters.count + 1
        RETURNING count
        "#,
    )
    .bind(recipient)
    .bind(channel)
    .bind(bucket)
    .fetch_one(&mut **tx)
    .await?;

    if row.0 > limit {
        let window_end = bucket + chrono::Duration::from_std(window).unwrap_or(chrono::Duration::seconds(0));
        let remaining = (window_end - now).to_std().unwrap_or(std::time::Duration::from_secs(1));
        return Ok(RateDecision::Defer { delay: remaining });
    }

    Ok(RateDecision::Proceed)
}

pub async fn purge_old_buckets(pool: &PgPool, retain: std::time::Duration) -> Result<u64> {
    let seconds = retain.as_secs_f64();
    let result = sqlx::query(
        "DELETE FROM rate_counters WHERE bucket_start < now() - ($1::text || ' seconds')::interval",
    )
    .bind(seconds)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
