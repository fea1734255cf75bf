//! Hybrid search engine (component C) — lexical + vector candidate retrieval,
//! min/max normalization, weighted combination, keyword boost, and access
//! control, over the `memories` and `notes` row families (§4.C).

pub mod hybrid;
pub mod lexical;
pub mod vector;

pub use hybrid::{search_memories, search_notes, ScoredRow, SearchOutcome};

use crate::domains::memories::model::MemoryType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Hybrid,
    Text,
    Vector,
}

#[derive(Debug, Clone)]
pub struct SearchFilters {
    pub namespaces: Vec<String>,
    pub tags: Vec<String>,
    pub memory_type: Option<MemoryType>,
    pub caller_email: String,
    pub granted_namespaces: Vec<String>,
    pub limit: i64,
    pub offset: i64,
    pub vector_weight: f64,
    pub text_weight: f64,
}

impl SearchFilters {
    pub fn weights(&self) -> (f64, f64) {
        (self.vector_weight, self.text_weight)
    }
}
