//! Per-key notification dedup (§4.H). Before emitting an outbox row, compute
//! `sha256(kind || recipient || dedup_grouping)`; a hit within the window
//! means skip. Grounded on the teacher's `content_hash::generate_content_hash`
//! SHA256-hex pattern.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Transaction};

pub fn dedup_key(kind: &str, recipient: &str, dedup_grouping: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b"\0");
    hasher.update(recipient.as_bytes());
    hasher.update(b"\0");
    hasher.update(dedup_grouping.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Inserts the dedup entry iff none exists within `window`. Returns `true` if
/// the caller should proceed (no recent entry), `false` to skip the emit.
/// Must run inside the same transaction as the emit it's guarding (§4.H).
pub async fn check_and_record(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    window: std::time::Duration,
) -> Result<bool> {
    let existing: Option<(DateTime<Utc>,)> = sqlx::query_as(
        "SELECT created_at FROM dedup_entries WHERE key = $1",
    )
    .bind(key)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some((created_at,)) = existing {
        let age = Utc::now() - created_at;
        if age < chrono::Duration::from_std(window).unwrap_or(chrono::Duration::seconds(0)) {
            return Ok(false);
        }
        sqlx::query("UPDATE dedup_entries SET created_at = now() WHERE key = $1")
            .bind(key)
            .execute(&mut **tx)
            .await?;
        return Ok(true);
    }

    sqlx::query("INSERT INTO dedup_entries (key, created_at) VALUES ($1, now())")
        .bind(key)
        .execute(&mut **tx)
        .await?;
    Ok(true)
}

pub async fn purge_expired(pool: &PgPool, window: std::time::Duration) -> Result<u64> {
    let seconds = window.as_secs_f64();
    let result = sqlx::query(
        "DELETE FROM dedup_entries WHERE created_at < now() - ($1::text || ' seconds')::interval",
    )
    .bind(seconds)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
