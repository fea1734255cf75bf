//! WorkItem entity (§3) — hierarchical unit of work.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::common::WorkItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    Project,
    Initiative,
    Epic,
    Issue,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Backlog,
    Open,
    InProgress,
    Done,
    Cancelled,
}

impl WorkItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkItemStatus::Done | WorkItemStatus::Cancelled)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub kind: WorkItemKind,
    pub parent_id: Option<WorkItemId>,
    pub status: WorkItemStatus,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validates the parent-kind invariants in §3 before any insert/update.
/// Acyclicity is checked separately (requires a DB round trip to walk
/// ancestors) by `assert_acyclic`.
pub fn validate_parent_kind(kind: WorkItemKind, parent_kind: Option<WorkItemKind>) -> Result<()> {
    use WorkItemKind::*;
    match (kind, parent_kind) {
        (Project, None) => Ok(()),
        (Project, Some(_)) => Err(anyhow!("a project may not have a parent")),
        (Initiative, None) => Ok(()),
        (Initiative, Some(Project)) => Ok(()),
        (Initiative, Some(_)) => Err(anyhow!("an initiative's parent, if any, must be a project")),
        (Epic, Some(Initiative)) => Ok(()),
        (Epic, _) => Err(anyhow!("an epic must have an initiative parent")),
        (Issue, Some(Epic)) => Ok(()),
        (Issue, _) => Err(anyhow!("an issue must have an epic parent")),
        (Task, _) => Ok(()),
    }
}

pub fn validate_date_order(not_before: Option<DateTime<Utc>>, not_after: Option<DateTime<Utc>>) -> Result<()> {
    if let (Some(nb), Some(na)) = (not_before, not_after) {
        if nb > na {
            return Err(anyhow!("not_before must be <= not_after"));
        }
    }
    Ok(())
}

impl WorkItem {
    pub async fn find_by_id(id: WorkItemId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM work_items WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Walks ancestors from `parent_id` to confirm `id` does not already
    /// appear in the chain, preventing a cycle on insert/update (§3).
    pub async fn assert_acyclic(
        id: WorkItemId,
        parent_id: Option<WorkItemId>,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<()> {
        let mut current = parent_id;
        let mut hops = 0;
        while let Some(cursor) = current {
            if cursor == id {
                return Err(anyhow!("parent graph would contain a cycle"));
            }
            hops += 1;
            if hops > 10_000 {
                return Err(anyhow!("parent chain too deep to validate"));
            }
            current = sqlx::query_scalar::<_, Option<WorkItemId>>(
                "SELECT parent_id FROM work_items WHERE id = $1",
            )
            .bind(cursor)
            .fetch_optional(&mut **tx)
            .await?
            .flatten();
        }
        Ok(())
    }
}
