//! Lexical candidate queries — full-text rank over the trigger-maintained
//! `lexical_index` tsvector column (§4.C step 2, §9 design note on triggers).

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::SearchFilters;

pub async fn candidates_memories(
    pool: &PgPool,
    query: &str,
    filters: &SearchFilters,
    k: i64,
) -> Result<Vec<(Uuid, f64)>> {
    sqlx::query_as::<_, (Uuid, f64)>(
        r#"
        SELECT id, ts_rank(lexical_index, plainto_tsquery('english', $1)) AS score
        FROM memories
        WHERE lexical_index @@ plainto_tsquery('english', $1)
          AND (user_email = $2 OR namespace = ANY($3))
          AND (cardinality($4::text[]) = 0 OR namespace = ANY($4))
          AND ($5::text IS NULL OR memory_type = $5)
          AND (cardinality($6::text[]) = 0 OR tags && $6)
        ORDER BY score DESC
        LIMIT $7
        "#,
    )
    .bind(query)
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
    query: &str,
    filters: &SearchFilters,
    k: i64,
) -> Result<Vec<(Uuid, f64)>> {
    sqlx::query_as::<_, (Uuid, f64)>(
        r#"
        SELECT id, ts_rank(lexical_index, plainto_tsquery('english', $1)) AS score
        FROM notes
        WHERE lexical_index @@ plainto_tsquery('english', $1)
          AND (
                user_email = $2
                OR visibility = 'public'
                OR (NOT (visibility = 'private' AND hide_from_agents) AND namespace = ANY($3))
              )
          AND (cardinality($4::text[]) = 0 OR namespace = ANY($4))
          AND ($5::text IS NULL OR memory_type = $5)
          AND (cardinality($6::text[]) = 0 OR tags && $6)
        ORDER BY score DESC
        LIMIT $7
        "#,
    )
    .bind(query)
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
