//! Combines lexical and vector candidate sets into a single ranked result
//! list: normalize, weight, dedup, keyword-boost, tie-break (§4.C).

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::memories::{self, model::Memory};
use crate::domains::notes::{self, model::Note};
use crate::kernel::embedding::QueryEmbedder;

use super::{lexical, vector, SearchFilters, SearchType};

const DEFAULT_KEYWORD_BOOST: f64 = 0.05;

pub trait SearchableRow {
    fn row_id(&self) -> Uuid;
    fn row_title(&self) -> &str;
    fn row_tags(&self) -> &[String];
    fn row_updated_at(&self) -> DateTime<Utc>;
}

impl SearchableRow for Memory {
    fn row_id(&self) -> Uuid {
        self.id.into_uuid()
    }
    fn row_title(&self) -> &str {
        &self.title
    }
    fn row_tags(&self) -> &[String] {
        &self.tags
    }
    fn row_updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl SearchableRow for Note {
    fn row_id(&self) -> Uuid {
        self.id.into_uuid()
    }
    fn row_title(&self) -> &str {
        &self.title
    }
    fn row_tags(&self) -> &[String] {
        &self.tags
    }
    fn row_updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone)]
pub struct ScoredRow<R> {
    pub row: R,
    pub vector_score: Option<f64>,
    pub text_score: Option<f64>,
    pub combined_score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome<R> {
    pub results: Vec<ScoredRow<R>>,
    pub search_type: SearchType,
    pub weights: (f64, f64),
}

/// Min/max normalizes raw scores to [0, 1] within their own result set
/// (§4.C step 3). An empty or singleton set normalizes every entry to 1.0 —
/// there is nothing to rank against, so nothing is penalized.
pub fn normalize(scores: &[(Uuid, f64)]) -> HashMap<Uuid, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let min = scores.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let max = scores.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    scores
        .iter()
        .map(|(id, s)| {
            let norm = if range.abs() < f64::EPSILON { 1.0 } else { (s - min) / range };
            (*id, norm)
        })
        .collect()
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Applies the keyword boost and the final combined-score cap (§4.C step 6),
/// then sorts by combined score desc, tie-broken by `updated_at` desc then
/// `id` asc (§4.C step 7 / §8 edge cases).
pub fn rank_and_boost<R: SearchableRow>(
    rows: Vec<R>,
    lexical_norm: &HashMap<Uuid, f64>,
    vector_norm: &HashMap<Uuid, f64>,
    weights: (f64, f64),
    query_tokens: &[String],
    keyword_boost: f64,
    limit: usize,
) -> Vec<ScoredRow<R>> {
    let (w_v, w_t) = weights;

    let mut scored: Vec<ScoredRow<R>> = rows
        .into_iter()
        .map(|row| {
            let id = row.row_id();
            let text_score = lexical_norm.get(&id).copied();
            let vector_score = vector_norm.get(&id).copied();
            let mut combined = w_v * vector_score.unwrap_or(0.0) + w_t * text_score.unwrap_or(0.0);

            let title_lower = row.row_title().to_lowercase();
            let keyword_hit = query_tokens.iter().any(|tok| title_lower.contains(tok.as_str()))
                || row.row_tags().iter().any(|tag| query_tokens.iter().any(|tok| tag.to_lowercase() == *tok));
            if keyword_hit {
                combined += keyword_boost;
            }
            combined = combined.min(1.0);

            ScoredRow {
                row,
                vector_score,
                text_score,
                combined_score: combined,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.row.row_updated_at().cmp(&a.row.row_updated_at()))
            .then_with(|| a.row.row_id().cmp(&b.row.row_id()))
    });
    scored.truncate(limit);
    scored
}

async fn query_embedding(
    embedding_client: Option<&(dyn QueryEmbedder)>,
    query: &str,
    tokens: &[String],
) -> (Option<Vec<f32>>, SearchType) {
    if tokens.len() < 2 {
        return (None, SearchType::Text);
    }
    match embedding_client {
        None => (None, SearchType::Text),
        Some(client) => match client.embed_query(query).await {
            Ok(vec) => (Some(vec), SearchType::Hybrid),
            Err(err) => {
                tracing::warn!(error = %err, "vector query failed, continuing text-only");
                (None, SearchType::Text)
            }
        },
    }
}

pub async fn search_memories(
    pool: &PgPool,
    query: &str,
    filters: &SearchFilters,
    embedding_client: Option<&(dyn QueryEmbedder)>,
) -> Result<SearchOutcome<Memory>> {
    let tokens = tokenize(query);
    let k = (50).max(4 * filters.limit);

    let (embedding, mut search_type) = query_embedding(embedding_client, query, &tokens).await;

    let lexical_raw = lexical::candidates_memories(pool, query, filters, k).await?;
    let vector_raw = match &embedding {
        Some(vec) => vector::candidates_memories(pool, vec, filters, k).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "vector candidate query failed, continuing text-only");
            search_type = SearchType::Text;
            Vec::new()
        }),
        None => Vec::new(),
    };

    let lexical_norm = normalize(&lexical_raw);
    let vector_norm = normalize(&vector_raw);

    let mut ids: Vec<Uuid> = lexical_raw.iter().map(|(id, _)| *id).collect();
    ids.extend(vector_raw.iter().map(|(id, _)| *id));
    ids.sort_unstable();
    ids.dedup();

    let rows = memories::repo::find_by_ids(pool, &ids).await?;
    let results = rank_and_boost(
        rows,
        &lexical_norm,
        &vector_norm,
        filters.weights(),
        &tokens,
        DEFAULT_KEYWORD_BOOST,
        filters.limit.max(0) as usize,
    );

    if vector_raw.is_empty() && lexical_raw.is_empty() {
        search_type = SearchType::Text;
    } else if embedding.is_none() {
        search_type = SearchType::Text;
    }

    Ok(SearchOutcome {
        results,
        search_type,
        weights: filters.weights(),
    })
}

pub async fn search_notes(
    pool: &PgPool,
    query: &str,
    filters: &SearchFilters,
    embedding_client: Option<&(dyn QueryEmbedder)>,
) -> Result<SearchOutcome<Note>> {
    let tokens = tokenize(query);
    let k = (50).max(4 * filters.limit);

    let (embedding, mut search_type) = query_embedding(embedding_client, query, &tokens).await;

    let lexical_raw = lexical::candidates_notes(pool, query, filters, k).await?;
    let vector_raw = match &embedding {
        Some(vec) => vector::candidates_notes(pool, vec, filters, k).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "vector candidate query failed, continuing text-only");
            search_type = SearchType::Text;
            Vec::new()
        }),
        None => Vec::new(),
    };

    let lexical_norm = normalize(&lexical_raw);
    let vector_norm = normalize(&vector_raw);

    let mut ids: Vec<Uuid> = lexical_raw.iter().map(|(id, _)| *id).collect();
    ids.extend(vector_raw.iter().map(|(id, _)| *id));
    ids.sort_unstable();
    ids.dedup();

    let rows = notes::repo::find_by_ids(pool, &ids).await?;
    let results = rank_and_boost(
        rows,
        &lexical_norm,
        &vector_norm,
        filters.weights(),
        &tokens,
        DEFAULT_KEYWORD_BOOST,
        filters.limit.max(0) as usize,
    );

    if embedding.is_none() {
        search_type = SearchType::Text;
    }

    Ok(SearchOutcome {
        results,
        search_type,
        weights: filters.weights(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        id: Uuid,
        title: String,
        tags: Vec<String>,
        updated_at: DateTime<Utc>,
    }

    impl SearchableRow for Row {
        fn row_id(&self) -> Uuid {
            self.id
        }
        fn row_title(&self) -> &str {
            &self.title
        }
        fn row_tags(&self) -> &[String] {
            &self.tags
        }
        fn row_updated_at(&self) -> DateTime<Utc> {
            self.updated_at
        }
    }

    fn row(id: Uuid, title: &str, updated_at: DateTime<Utc>) -> Row {
        Row {
            id,
            title: title.into(),
            tags: vec![],
            updated_at,
        }
    }

    #[test]
    fn normalize_empty_set_is_empty() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn normalize_maps_min_to_zero_and_max_to_one() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let norm = normalize(&[(a, 1.0), (b, 3.0)]);
        assert_eq!(norm[&a], 0.0);
        assert_eq!(norm[&b], 1.0);
    }

    #[test]
    fn normalize_is_idempotent_once_already_in_zero_one() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let first = normalize(&[(a, 0.2), (b, 0.9)]);
        let as_vec: Vec<(Uuid, f64)> = vec![(a, first[&a]), (b, first[&b])];
        let second = normalize(&as_vec);
        assert!((second[&a] - first[&a]).abs() < 1e-9);
        assert!((second[&b] - first[&b]).abs() < 1e-9);
    }

    #[test]
    fn normalize_singleton_set_gets_full_score() {
        let a = Uuid::new_v4();
        let norm = normalize(&[(a, 42.0)]);
        assert_eq!(norm[&a], 1.0);
    }

    #[test]
    fn rank_and_boost_combines_weighted_scores() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let rows = vec![row(a, "Plain Title", now)];
        let mut lex = HashMap::new();
        lex.insert(a, 0.5);
        let mut vec_scores = HashMap::new();
        vec_scores.insert(a, 1.0);

        let ranked = rank_and_boost(rows, &lex, &vec_scores, (0.7, 0.3), &[], 0.05, 10);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].combined_score - (0.7 * 1.0 + 0.3 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn rank_and_boost_applies_title_keyword_boost() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let rows = vec![row(a, "TypeScript Guide", now)];
        let lex = HashMap::new();
        let vec_scores = HashMap::new();
        let tokens = vec!["typescript".to_string()];

        let ranked = rank_and_boost(rows, &lex, &vec_scores, (0.7, 0.3), &tokens, 0.05, 10);
        assert!((ranked[0].combined_score - 0.05).abs() < 1e-9);
    }

    #[test]
    fn rank_and_boost_caps_combined_score_at_one() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let rows = vec![row(a, "Match Title", now)];
        let mut lex = HashMap::new();
        lex.insert(a, 1.0);
        let mut vec_scores = HashMap::new();
        vec_scores.insert(a, 1.0);
        let tokens = vec!["match".to_string()];

        let ranked = rank_and_boost(rows, &lex, &vec_scores, (0.7, 0.3), &tokens, 0.05, 10);
        assert_eq!(ranked[0].combined_score, 1.0);
    }

    #[test]
    fn rank_and_boost_tie_breaks_by_updated_at_desc_then_id_asc() {
        let now = Utc::now();
        let older = now - chrono::Duration::seconds(60);
        let a = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let b = Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap();
        let rows = vec![row(b, "X", older), row(a, "X", now)];
        let lex = HashMap::new();
        let vec_scores = HashMap::new();

        let ranked = rank_and_boost(rows, &lex, &vec_scores, (0.7, 0.3), &[], 0.05, 10);
        assert_eq!(ranked[0].row.id, a);
        assert_eq!(ranked[1].row.id, b);
    }

    #[test]
    fn rank_and_boost_truncates_to_limit() {
        let now = Utc::now();
        let rows: Vec<Row> = (0..5).map(|_| row(Uuid::new_v4(), "x", now)).collect();
        let lex = HashMap::new();
        let vec_scores = HashMap::new();

        let ranked = rank_and_boost(rows, &lex, &vec_scores, (0.7, 0.3), &[], 0.05, 2);
        assert_eq!(ranked.len(), 2);
    }
}
