//! External API source client — the collaborator behind `api.refresh` (§4.E).
//! Treated as an external boundary, same as the embedding provider: this
//! module specifies only the trait the handler depends on.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiSpecDiff {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
}

impl ApiSpecDiff {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

#[async_trait]
pub trait ApiSourceClient: Send + Sync {
    async fn refresh(&self, api_source_id: Uuid) -> anyhow::Result<ApiSpecDiff>;
}
