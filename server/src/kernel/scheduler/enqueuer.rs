//! Write-time scheduler (§4.G-i) — enqueues/cancels reminder and nudge jobs
//! within the same transaction as the work-item write that triggered them,
//! so enqueue is atomic with the mutation.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::common::WorkItemId;
use crate::kernel::jobs::model::JobKind;

/// The subset of a work item's fields relevant to scheduling, before and
/// after a write, so the caller can detect "removed or moved earlier".
#[derive(Debug, Clone, Copy)]
pub struct ScheduleFields {
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
}

/// Reacts to a work-item create/update. `previous` is `None` on create.
pub async fn on_work_item_write(
    tx: &mut Transaction<'_, Postgres>,
    work_item_id: WorkItemId,
    title: &str,
    previous: Option<ScheduleFields>,
    current: ScheduleFields,
) -> anyhow::Result<()> {
    reconcile_timestamp_job(
        tx,
        JobKind::ReminderWorkItemNotBefore,
        "/hooks/agent",
        work_item_id,
        "not_before",
        title,
        previous.and_then(|p| p.not_before),
        current.not_before,
    )
    .await?;

    reconcile_timestamp_job(
        tx,
        JobKind::NudgeWorkItemNotAfter,
        "/hooks/wake",
        work_item_id,
        "not_after",
        title,
        previous.and_then(|p| p.not_after),
        current.not_after,
    )
    .await?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn reconcile_timestamp_job(
    tx: &mut Transaction<'_, Postgres>,
    kind: JobKind,
    payload_field: &str,
    work_item_id: WorkItemId,
    field_name: &str,
    title: &str,
    previous: Option<DateTime<Utc>>,
    current: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    let now = Utc::now();

    let should_cancel_previous = match (previous, current) {
        (Some(_), None) => true,
        (Some(prev), Some(curr)) => curr < prev,
        _ => false,
    };

    if should_cancel_previous {
        if let Some(prev) = previous {
            let old_key = idempotency_key(work_item_id, field_name, prev);
            cancel_job(tx, kind, &old_key).await?;
        }
    }

    if let Some(instant) = current {
        if instant > now {
            let key = idempotency_key(work_item_id, field_name, instant);
            let payload = serde_json::json!({
                "work_item_id": work_item_id.into_uuid(),
                payload_field: instant,
                "title": title,
            });
            upsert_job(tx, kind, instant, payload, &key).await?;
        }
    }

    Ok(())
}

fn idempotency_key(work_item_id: WorkItemId, field_name: &str, instant: DateTime<Utc>) -> String {
    format!("{}:{}:{}", work_item_id, field_name, instant.to_rfc3339())
}

async fn upsert_job(
    tx: &mut Transaction<'_, Postgres>,
    kind: JobKind,
    run_at: DateTime<Utc>,
    payload: serde_json::Value,
    idempotency_key: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO jobs (kind, payload, run_at, idempotency_key)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (kind, idempotency_key) WHERE idempotency_key IS NOT NULL AND completed_at IS NULL
        DO UPDATE SET run_at = EXCLUDED.run_at, payload = EXCLUDED.payload
        RETURNING id
        "#,
    )
    .bind(kind.as_str())
    .bind(payload)
    .bind(run_at)
    .bind(idempotency_key)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

async fn cancel_job(
    tx: &mut Transaction<'_, Postgres>,
    kind: JobKind,
    idempotency_key: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE jobs SET completed_at = now(), updated_at = now() \
         WHERE kind = $1 AND idempotency_key = $2 AND completed_at IS NULL",
    )
    .bind(kind.as_str())
    .bind(idempotency_key)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
