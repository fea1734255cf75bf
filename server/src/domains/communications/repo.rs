//! Communications repository.

use anyhow::Result;
use sqlx::PgPool;

use crate::kernel::outbox::OutboxMessage;

use super::model::{Channel, Communication, CommunicationStatus, Direction};

pub async fn find_by_id(pool: &PgPool, id: crate::common::CommunicationId) -> Result<Option<Communication>> {
    sqlx::query_as::<_, Communication>("SELECT * FROM communications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

/// Counts communications addressed to `recipient` (matched by the owning
/// contact's endpoint value) since `since` — the digest job's unread count.
pub async fn count_since_for_recipient(
    pool: &PgPool,
    recipient: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT count(*)
        FROM communications c
        JOIN contacts ct ON ct.id = c.contact_id
        WHERE ct.value = $1 AND c.occurred_at >= $2
        "#,
    )
    .bind(recipient)
    .bind(since)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

/// Writes the terminal audit row for a successfully delivered outbox message
/// (§4.F "A successful delivery additionally writes a terminal Communication row").
pub async fn record_outbound_webhook(pool: &PgPool, message: &OutboxMessage) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO communications (direction, channel, contact_id, subject, body, status, occurred_at)
        VALUES ($1, $2, NULL, $3, $4, $5, now())
        "#,
    )
    .bind(Direction::Outbound)
    .bind(Channel::Webhook)
    .bind(&message.kind)
    .bind(message.body.to_string())
    .bind(CommunicationStatus::Sent)
    .execute(pool)
    .await?;
    Ok(())
}
