//! Cron-time scheduler path (§4.G-ii): a periodic tick running maintenance
//! queries. Purely a safety net — every enqueue here re-derives the same
//! `idempotency_key` the write-time path would have used and relies on the
//! store's enqueue-dedup to make re-scans no-ops (§9 Decision).

use std::time::Duration;

use chrono::Timelike;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::domains::work_items::model::{WorkItem, WorkItemStatus};
use crate::kernel::jobs::model::JobKind;
use crate::kernel::scheduler::enqueuer::{self, ScheduleFields};

pub struct CronScheduler {
    pool: PgPool,
    tick_interval: Duration,
    digest_hour_utc: u32,
}

impl CronScheduler {
    pub fn from_config(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            tick_interval: config.scheduler_tick_interval,
            digest_hour_utc: config.digest_hour_utc,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.tick_interval.as_secs(), "cron scheduler starting");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.tick_interval) => {}
            }

            if let Err(err) = self.tick().await {
                error!(error = %err, "cron tick failed, will retry next interval");
            }
        }
        info!("cron scheduler stopped");
    }

    async fn tick(&self) -> anyhow::Result<()> {
        let rescanned = rescan_missed_schedules(&self.pool).await?;
        if rescanned > 0 {
            debug!(count = rescanned, "rescanned work items for missed schedule jobs");
        }

        let now = chrono::Utc::now();
        if now.minute() == 0 && now.hour() == self.digest_hour_utc {
            let enqueued = enqueue_daily_digests(&self.pool).await?;
            if enqueued > 0 {
                debug!(count = enqueued, "enqueued daily digest jobs");
            }
        }

        let refreshed = enqueue_due_api_refreshes(&self.pool).await?;
        if refreshed > 0 {
            debug!(count = refreshed, "enqueued due api.refresh jobs");
        }

        Ok(())
    }
}

/// Re-derives the write-time enqueue for every non-terminal work item with a
/// future `not_before`/`not_after`, relying on `ON CONFLICT` dedup to make
/// this a no-op for items whose job already exists (recovery after outage).
pub async fn rescan_missed_schedules(pool: &PgPool) -> anyhow::Result<usize> {
    let items: Vec<WorkItem> = sqlx::query_as(
        r#"
        SELECT * FROM work_items
        WHERE status NOT IN ('done', 'cancelled')
          AND (not_before IS NOT NULL OR not_after IS NOT NULL)
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut touched = 0usize;
    for item in items {
        if item.status.is_terminal() {
            continue;
        }
        let mut tx = pool.begin().await?;
        enqueuer::on_work_item_write(
            &mut tx,
            item.id,
            &item.title,
            None,
            ScheduleFields {
                not_before: item.not_before,
                not_after: item.not_after,
            },
        )
        .await?;
        tx.commit().await?;
        touched += 1;
    }

    Ok(touched)
}

/// Enqueues one `digest.daily` job per distinct recipient known to the system
/// (the set of memory/note owner emails), deduped by a date-scoped key.
pub async fn enqueue_daily_digests(pool: &PgPool) -> anyhow::Result<usize> {
    let recipients: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT user_email FROM memories UNION SELECT DISTINCT user_email FROM notes",
    )
    .fetch_all(pool)
    .await?;

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let mut enqueued = 0usize;
    for recipient in recipients {
        let key = format!("digest.daily:{recipient}:{today}");
        let payload = serde_json::json!({ "recipient": recipient });
        let inserted = sqlx::query_scalar::<_, Option<uuid::Uuid>>(
            r#"
            INSERT INTO jobs (kind, payload, run_at, idempotency_key)
            VALUES ($1, $2, now(), $3)
            ON CONFLICT (kind, idempotency_key) WHERE idempotency_key IS NOT NULL AND completed_at IS NULL
            DO NOTHING
            RETURNING id
            "#,
        )
        .bind(JobKind::DigestDaily.as_str())
        .bind(payload)
        .bind(&key)
        .fetch_optional(pool)
        .await?
        .flatten();

        if inserted.is_some() {
            enqueued += 1;
        }
    }

    Ok(enqueued)
}

/// Enqueues `api.refresh` jobs for every onboarded API source whose refresh
/// cadence has elapsed since its last run.
pub async fn enqueue_due_api_refreshes(pool: &PgPool) -> anyhow::Result<usize> {
    let due: Vec<(uuid::Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM api_sources
        WHERE last_refreshed_at IS NULL
           OR last_refreshed_at < now() - (cadence_seconds::text || ' seconds')::interval
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut enqueued = 0usize;
    for (api_source_id,) in due {
        let key = format!("api.refresh:{api_source_id}:{}", chrono::Utc::now().timestamp() / 60);
        let payload = serde_json::json!({ "api_source_id": api_source_id });
        let inserted = sqlx::query_scalar::<_, Option<uuid::Uuid>>(
            r#"
            INSERT INTO jobs (kind, payload, run_at, idempotency_key)
            VALUES ($1, $2, now(), $3)
            ON CONFLICT (kind, idempotency_key) WHERE idempotency_key IS NOT NULL AND completed_at IS NULL
            DO NOTHING
            RETURNING id
            "#,
        )
        .bind(JobKind::ApiRefresh.as_str())
        .bind(payload)
        .bind(&key)
        .fetch_optional(pool)
        .await?
        .flatten();

        if inserted.is_some() {
            sqlx::query("UPDATE api_sources SET last_refreshed_at = now() WHERE id = $1")
                .bind(api_source_id)
                .execute(pool)
                .await?;
            enqueued += 1;
        }
    }

    Ok(enqueued)
}

