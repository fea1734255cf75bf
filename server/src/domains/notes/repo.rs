//! Notes repository — CRUD plus the same embedding-status machine as memories,
//! gated additionally by `should_embed` (private+hide_from_agents skips embedding).

use anyhow::Result;
use sqlx::PgPool;

use crate::common::{ContactId, NoteId, WorkItemId};
use crate::domains::memories::model::MemoryType;

use super::model::{Note, Visibility};

pub struct NewNote {
    pub namespace: String,
    pub memory_type: MemoryType,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub importance: i16,
    pub user_email: String,
    pub work_item_id: Option<WorkItemId>,
    pub contact_id: Option<ContactId>,
    pub visibility: Visibility,
    pub hide_from_agents: bool,
}

pub async fn create(pool: &PgPool, new_note: NewNote) -> Result<Note> {
    let skip = new_note.visibility == Visibility::Private && new_note.hide_from_agents;
    let status = if skip { "skipped" } else { "pending" };

    sqlx::query_as::<_, Note>(
        r#"
        INSERT INTO notes
            (namespace, memory_type, title, content, embedding_status, tags, importance,
             user_email, work_item_id, contact_id, visibility, hide_from_agents)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(&new_note.namespace)
    .bind(new_note.memory_type)
    .bind(&new_note.title)
    .bind(&new_note.content)
    .bind(status)
    .bind(&new_note.tags)
    .bind(new_note.importance)
    .bind(&new_note.user_email)
    .bind(new_note.work_item_id)
    .bind(new_note.contact_id)
    .bind(new_note.visibility)
    .bind(new_note.hide_from_agents)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn find_by_id(pool: &PgPool, id: NoteId) -> Result<Option<Note>> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

pub async fn update_content(pool: &PgPool, id: NoteId, title: &str, content: &str) -> Result<Note> {
    let existing = find_by_id(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("note not found"))?;
    let status = if existing.should_embed() { "pending" } else { "skipped" };

    sqlx::query_as::<_, Note>(
        r#"
        UPDATE notes
        SET title = $2, content = $3, embedding = NULL, embedding_status = $4, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(content)
    .bind(status)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

/// Changing visibility or `hide_from_agents` re-evaluates `should_embed`: a note
/// moving into the private+hidden combination drops its embedding immediately.
pub async fn update_visibility(
    pool: &PgPool,
    id: NoteId,
    visibility: Visibility,
    hide_from_agents: bool,
) -> Result<Note> {
    let skip = visibility == Visibility::Private && hide_from_agents;

    if skip {
        sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
            SET visibility = $2, hide_from_agents = $3, embedding = NULL,
                embedding_status = 'skipped', updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(visibility)
        .bind(hide_from_agents)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    } else {
        sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
            SET visibility = $2, hide_from_agents = $3,
                embedding_status = CASE WHEN embedding_status = 'skipped' THEN 'pending' ELSE embedding_status END,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(visibility)
        .bind(hide_from_agents)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}

/// Batch fetch for search-result hydration; order is not preserved, callers
/// re-sort by the score they already computed from the candidate query.
pub async fn find_by_ids(pool: &PgPool, ids: &[uuid::Uuid]) -> Result<Vec<Note>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
}

pub async fn claim_pending_embeddings(pool: &PgPool, batch_size: i64) -> Result<Vec<Note>> {
    sqlx::query_as::<_, Note>(
        "SELECT * FROM notes WHERE embedding_status = 'pending' ORDER BY created_at ASC LIMIT $1",
    )
    .bind(batch_size)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn mark_embedded(pool: &PgPool, id: NoteId, embedding: &[f32]) -> Result<()> {
    let vector = pgvector::Vector::from(embedding.to_vec());
    sqlx::query(
        "UPDATE notes SET embedding = $2, embedding_status = 'complete', updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(vector)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_embedding_failed(pool: &PgPool, id: NoteId) -> Result<()> {
    sqlx::query("UPDATE notes SET embedding_status = 'failed', updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: NoteId) -> Result<()> {
    sqlx::query("DELETE FROM notes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
