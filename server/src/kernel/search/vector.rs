//! Vector candidate queries — cosine similarity via pgvector's `<=>` operator,
//! grounded on the teacher's `1 - (embedding <=> $1) AS similarity` pattern.

use anyhow::Result;
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use super::SearchFilters;

pub async fn candidates_memories(
    pool: &PgPool,
    embedding: &[f32],
    filters: &SearchFilters,
    k: i64,
) -> Result<Vec<(Uuid, f64)>> {
    let vector = Vector::from(embedding.to_vec());
    sqlx::query_as::<_, (Uuid, f64)>(
        r#"
        SELECT id, 1 - (embedding <=> $1) AS score
        FROM memories
        WHERE embedding IS NOT NULL
          AND embedding_status = 'complete'
          AND (user_email = $2 OR namespace = ANY($3))
          AND (cardinality($4::text[]) = 0 OR namespace = ANY($4))
          AND ($5::text IS NULL OR memory_type = $5)
          AND (cardinality($6::text[]) = 0 OR tags && $6)
        ORDER BY embedding <=> $1 ASC
        LIMIT $7
        "#,
    )
    .bind(vector)
    .bind(&filters.caller_email)
    .bind(&filters.granted_namespaces)
    .bind(&filters.namespaces)
    .bind(filters.memory_type.map(|t| t.to_string()))
    .bind(&filters.tags)
    .bind(k)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn candidates_notes(
    pool: &PgPool,
    embedding: &[f32],
    filters: &SearchFilters,
    k: i64,
) -> Result<Vec<(Uuid, f64)>> {
    let vector = Vector::from(embedding.to_vec());
    sqlx::query_as::<_, (Uuid, f64)>(
        r#"
        SELECT id, 1 - (embedding <=> $1) AS score
        FROM notes
        WHERE embedding IS NOT NULL
          AND embedding_status = 'complete'
          AND (
                user_email = $2
                OR visibility = 'public'
                OR (NOT (visibility = 'private' AND hide_from_agents) AND namespace = ANY($3))
              )
          AND (cardinality($4::text[]) = 0 OR namespace = ANY($4))
          AND ($5::text IS NULL OR memory_type = $5)
          AND (cardinality($6::text[]) = 0 OR tags && $6)
        ORDER BY embedding <=> $1 ASC
        LIMIT $7
        "#,
    )
    .bind(vector)
    .bind(&filters.caller_email)
    .bind(&filters.granted_namespaces)
    .bind(&filters.namespaces)
    .bind(filters.memory_type.map(|t| t.to_string()))
    .bind(&filters.tags)
    .bind(k)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}
