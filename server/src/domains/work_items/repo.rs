//! WorkItem repository — create/update run inside a transaction that also
//! performs the write-time scheduling reaction (§4.G-i), so a failed enqueue
//! fails the whole mutation.

use anyhow::Result;
use sqlx::PgPool;

use crate::common::WorkItemId;
use crate::kernel::scheduler::enqueuer::{self, ScheduleFields};

use super::model::{validate_date_order, validate_parent_kind, WorkItem, WorkItemKind, WorkItemStatus};

pub struct NewWorkItem {
    pub title: String,
    pub kind: WorkItemKind,
    pub parent_id: Option<WorkItemId>,
    pub not_before: Option<chrono::DateTime<chrono::Utc>>,
    pub not_after: Option<chrono::DateTime<chrono::Utc>>,
    pub sort_order: i32,
}

pub async fn create(pool: &PgPool, new_item: NewWorkItem) -> Result<WorkItem> {
    validate_date_order(new_item.not_before, new_item.not_after)?;

    let mut tx = pool.begin().await?;

    let parent_kind = match new_item.parent_id {
        Some(parent_id) => {
            let parent: Option<WorkItem> =
                sqlx::query_as("SELECT * FROM work_items WHERE id = $1")
                    .bind(parent_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            Some(parent.ok_or_else(|| anyhow::anyhow!("parent work item not found"))?.kind)
        }
        None => None,
    };
    validate_parent_kind(new_item.kind, parent_kind)?;

    let item: WorkItem = sqlx::query_as(
        r#"
        INSERT INTO work_items (title, kind, parent_id, status, not_before, not_after, sort_order)
        VALUES ($1, $2, $3, 'backlog', $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&new_item.title)
    .bind(new_item.kind)
    .bind(new_item.parent_id)
    .bind(new_item.not_before)
    .bind(new_item.not_after)
    .bind(new_item.sort_order)
    .fetch_one(&mut *tx)
    .await?;

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
    Ok(item)
}

pub async fn update_schedule(
    pool: &PgPool,
    id: WorkItemId,
    not_before: Option<chrono::DateTime<chrono::Utc>>,
    not_after: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<WorkItem> {
    validate_date_order(not_before, not_after)?;

    let mut tx = pool.begin().await?;

    let previous: WorkItem = sqlx::query_as("SELECT * FROM work_items WHERE id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    let updated: WorkItem = sqlx::query_as(
        "UPDATE work_items SET not_before = $2, not_after = $3, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(not_before)
    .bind(not_after)
    .fetch_one(&mut *tx)
    .await?;

    enqueuer::on_work_item_write(
        &mut tx,
        id,
        &updated.title,
        Some(ScheduleFields {
            not_before: previous.not_before,
            not_after: previous.not_after,
        }),
        ScheduleFields {
            not_before: updated.not_before,
            not_after: updated.not_after,
        },
    )
    .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Moves `id` under `new_parent_id` (or to the root if `None`). The only write
/// that can introduce a parent cycle post-creation, so it's the one that runs
/// `assert_acyclic` alongside the usual kind validation.
pub async fn reparent(pool: &PgPool, id: WorkItemId, new_parent_id: Option<WorkItemId>) -> Result<WorkItem> {
    let mut tx = pool.begin().await?;

    let item: WorkItem = sqlx::query_as("SELECT * FROM work_items WHERE id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    let parent_kind = match new_parent_id {
        Some(parent_id) => {
            let parent: Option<WorkItem> =
                sqlx::query_as("SELECT * FROM work_items WHERE id = $1")
                    .bind(parent_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            Some(parent.ok_or_else(|| anyhow::anyhow!("parent work item not found"))?.kind)
        }
        None => None,
    };
    validate_parent_kind(item.kind, parent_kind)?;
    WorkItem::assert_acyclic(id, new_parent_id, &mut tx).await?;

    let updated: WorkItem = sqlx::query_as(
        "UPDATE work_items SET parent_id = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(new_parent_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(updated)
}

pub async fn mark_status(pool: &PgPool, id: WorkItemId, status: WorkItemStatus) -> Result<WorkItem> {
    sqlx::query_as("UPDATE work_items SET status = $2, updated_at = now() WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
}

pub async fn find_by_id(pool: &PgPool, id: WorkItemId) -> Result<Option<WorkItem>> {
    WorkItem::find_by_id(id, pool).await
}
