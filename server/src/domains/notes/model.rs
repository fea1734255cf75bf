//! Note entity (§3) — near-identical to `Memory` for search purposes, with
//! an additional visibility tier and an agent-visibility override.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::common::{ContactId, NoteId, WorkItemId};
use crate::domains::memories::model::{EmbeddingStatus, MemoryType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Shared,
    Public,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
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
    pub visibility: Visibility,
    pub hide_from_agents: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Embedding is skipped when `visibility = private AND hide_from_agents = true`;
    /// public notes are always embedded regardless of `hide_from_agents` (§3).
    pub fn should_embed(&self) -> bool {
        !(self.visibility == Visibility::Private && self.hide_from_agents)
    }

    pub fn is_readable_by(&self, caller_email: &str, granted_namespaces: &[String]) -> bool {
        if self.user_email == caller_email {
            return true;
        }
        if self.visibility == Visibility::Private && self.hide_from_agents {
            return false;
        }
        match self.visibility {
            Visibility::Public => true,
            Visibility::Shared | Visibility::Private => granted_namespaces.iter().any(|n| n == &self.namespace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(now: DateTime<Utc>, visibility: Visibility, hide: bool) -> Note {
        Note {
            id: NoteId::new(),
            namespace: "default".into(),
            memory_type: MemoryType::Context,
            title: "t".into(),
            content: "c".into(),
            embedding: None,
            embedding_status: EmbeddingStatus::Pending,
            tags: vec![],
            importance: 5,
            user_email: "owner@example.com".into(),
            work_item_id: None,
            contact_id: None,
            visibility,
            hide_from_agents: hide,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn private_hidden_skips_embedding() {
        let note = base(Utc::now(), Visibility::Private, true);
        assert!(!note.should_embed());
    }

    #[test]
    fn private_visible_still_embeds() {
        let note = base(Utc::now(), Visibility::Private, false);
        assert!(note.should_embed());
    }

    #[test]
    fn public_always_embeds_even_when_hidden() {
        let note = base(Utc::now(), Visibility::Public, true);
        assert!(note.should_embed());
    }

    #[test]
    fn private_hidden_note_unreadable_by_non_owner() {
        let note = base(Utc::now(), Visibility::Private, true);
        assert!(!note.is_readable_by("other@example.com", &["default".to_string()]));
    }

    #[test]
    fn public_note_readable_by_anyone() {
        let note = base(Utc::now(), Visibility::Public, false);
        assert!(note.is_readable_by("other@example.com", &[]));
    }

    #[test]
    fn shared_note_requires_namespace_grant() {
        let note = base(Utc::now(), Visibility::Shared, false);
        assert!(!note.is_readable_by("other@example.com", &[]));
        assert!(note.is_readable_by("other@example.com", &["default".to_string()]));
    }
}
