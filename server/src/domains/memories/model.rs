//! Memory entity (§3) — an agent-owned fact/preference/decision with a
//! title+content embedding pipeline and a trigger-maintained lexical index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::common::{ContactId, MemoryId, WorkItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MemoryType {
    Preference,
    Fact,
    Decision,
    Context,
    NoteContext,
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemoryType::Preference => "preference",
            MemoryType::Fact => "fact",
            MemoryType::Decision => "decision",
            MemoryType::Context => "context",
            MemoryType::NoteContext => "note-context",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Pending,
    Complete,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub namespace: String,
    pub memory_type: MemoryType,
    pub title: String,
    pub content: String,
    #[sqlx(default)]
    pub embedding: Option<pgvector::Vector>,
    pub embedding_status: EmbeddingStatus,
    pub tags: Vec<String>,
    pub importance: i16,
    pub user_email: String,
    pub work_item_id: Option<WorkItemId>,
    pub contact_id: Option<ContactId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    /// `embedding` present iff `embedding_status = complete` (§3 invariant).
    pub fn invariant_holds(&self) -> bool {
        match self.embedding_status {
            EmbeddingStatus::Complete => self.embedding.is_some(),
            _ => self.embedding.is_none(),
        }
    }
}

pub fn validate_importance(importance: i16) -> anyhow::Result<()> {
    if !(1..=10).contains(&importance) {
        anyhow::bail!("importance must be between 1 and 10, got {importance}");
    }
    Ok(())
}

/// Access predicate used by hybrid search: owner always sees their own rows;
/// otherwise the caller's namespace must carry a grant for this memory's namespace.
pub fn is_readable(memory_namespace: &str, owner_email: &str, caller_email: &str, granted_namespaces: &[String]) -> bool {
    owner_email == caller_email || granted_namespaces.iter().any(|n| n == memory_namespace)
}

pub type MemoryOwnerRef = Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    fn base(now: DateTime<Utc>) -> Memory {
        Memory {
            id: MemoryId::new(),
            namespace: "default".into(),
            memory_type: MemoryType::Fact,
            title: "t".into(),
            content: "c".into(),
            embedding: None,
            embedding_status: EmbeddingStatus::Pending,
            tags: vec![],
            importance: 5,
            user_email: "owner@example.com".into(),
            work_item_id: None,
            contact_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_with_no_embedding_satisfies_invariant() {
        let now = Utc::now();
        assert!(base(now).invariant_holds());
    }

    #[test]
    fn complete_requires_embedding() {
        let now = Utc::now();
        let mut m = base(now);
        m.embedding_status = EmbeddingStatus::Complete;
        assert!(!m.invariant_holds());
        m.embedding = Some(pgvector::Vector::from(vec![0.1, 0.2]));
        assert!(m.invariant_holds());
    }

    #[test]
    fn complete_with_embedding_but_wrong_status_violates_invariant() {
        let now = Utc::now();
        let mut m = base(now);
        m.embedding = Some(pgvector::Vector::from(vec![0.1]));
        assert!(!m.invariant_holds());
    }

    #[test]
    fn importance_out_of_range_rejected() {
        assert!(validate_importance(0).is_err());
        assert!(validate_importance(11).is_err());
        assert!(validate_importance(1).is_ok());
        assert!(validate_importance(10).is_ok());
    }

    #[test]
    fn owner_always_reads_own_memory() {
        assert!(is_readable("ns-a", "owner@example.com", "owner@example.com", &[]));
    }

    #[test]
    fn non_owner_requires_namespace_grant() {
        let granted = vec!["ns-a".to_string()];
        assert!(is_readable("ns-a", "owner@example.com", "other@example.com", &granted));
        assert!(!is_readable("ns-b", "owner@example.com", "other@example.com", &granted));
    }
}
