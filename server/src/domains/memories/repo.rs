//! Memories repository — CRUD plus the embedding-status state machine (§3).

use anyhow::Result;
use sqlx::PgPool;

use crate::common::{ContactId, MemoryId, WorkItemId};

use super::model::{Memory, MemoryType, validate_importance};

pub struct NewMemory {
    pub namespace: String,
    pub memory_type: MemoryType,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub importance: i16,
    pub user_email: String,
    pub work_item_id: Option<WorkItemId>,
    pub contact_id: Option<ContactId>,
}

pub async fn create(pool: &PgPool, new_memory: NewMemory) -> Result<Memory> {
    validate_importance(new_memory.importance)?;

    sqlx::query_as::<_, Memory>(
        r#"
        INSERT INTO memories
            (namespace, memory_type, title, content, embedding_status, tags, importance,
             user_email, work_item_id, contact_id)
        VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(&new_memory.namespace)
    .bind(new_memory.memory_type)
    .bind(&new_memory.title)
    .bind(&new_memory.content)
    .bind(&new_memory.tags)
    .bind(new_memory.importance)
    .bind(&new_memory.user_email)
    .bind(new_memory.work_item_id)
    .bind(new_memory.contact_id)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn find_by_id(pool: &PgPool, id: MemoryId) -> Result<Option<Memory>> {
    sqlx::query_as::<_, Memory>("SELECT * FROM memories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

/// Batch fetch for search-result hydration; order is not preserved, callers
/// re-sort by the score they already computed from the candidate query.
pub async fn find_by_ids(pool: &PgPool, ids: &[uuid::Uuid]) -> Result<Vec<Memory>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Memory>("SELECT * FROM memories WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
}

/// Changing title/content flips `embedding_status` back to `pending` and nullifies
/// `embedding` (§3 invariant) — the caller never hand-sets embedding state directly.
pub async fn update_content(pool: &PgPool, id: MemoryId, title: &str, content: &str) -> Result<Memory> {
    sqlx::query_as::<_, Memory>(
        r#"
        UPDATE memories
        SET title = $2, content = $3, embedding = NULL, embedding_status = 'pending', updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(content)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn update_tags(pool: &PgPool, id: MemoryId, tags: Vec<String>) -> Result<Memory> {
    sqlx::query_as::<_, Memory>(
        "UPDATE memories SET tags = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(tags)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

/// Claims up to `batch_size` memories whose embedding is still pending, for the
/// embedding worker to compute and apply (see `mark_embedded`/`mark_embedding_failed`).
pub async fn claim_pending_embeddings(pool: &PgPool, batch_size: i64) -> Result<Vec<Memory>> {
    sqlx::query_as::<_, Memory>(
        "SELECT * FROM memories WHERE embedding_status = 'pending' ORDER BY created_at ASC LIMIT $1",
    )
    .bind(batch_size)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn mark_embedded(pool: &PgPool, id: MemoryId, embedding: &[f32]) -> Result<()> {
    let vector = pgvector::Vector::from(embedding.to_vec());
    sqlx::query(
        "UPDATE memories SET embedding = $2, embedding_status = 'complete', updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(vector)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_embedding_failed(pool: &PgPool, id: MemoryId) -> Result<()> {
    sqlx::query(
        "UPDATE memories SET embedding_status = 'failed', updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: MemoryId) -> Result<()> {
    sqlx::query("DELETE FROM memories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
