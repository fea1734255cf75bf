//! Process-wide dependency container, assembled once in `main` and shared
//! via `Arc` across every spawned worker and the health/admin HTTP surface.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::kernel::api_source::ApiSourceClient;
use crate::kernel::embedding::EmbeddingClient;
use crate::kernel::jobs::processor::JobDeps;
use crate::kernel::jobs::store::{JobStore, PostgresJobStore};
use crate::kernel::jobs::JobRegistry;
use crate::kernel::outbox::store::{OutboxStore, PostgresOutboxStore};

pub struct ServerDeps {
    pub pool: PgPool,
    pub config: Config,
    pub job_registry: Arc<JobRegistry>,
    pub job_store: Arc<dyn JobStore>,
    pub outbox_store: Arc<dyn OutboxStore>,
    pub embedding_client: Option<Arc<dyn EmbeddingClient>>,
    pub api_source_client: Option<Arc<dyn ApiSourceClient>>,
}

impl ServerDeps {
    pub fn new(
        pool: PgPool,
        config: Config,
        job_registry: JobRegistry,
        embedding_client: Option<Arc<dyn EmbeddingClient>>,
        api_source_client: Option<Arc<dyn ApiSourceClient>>,
    ) -> Self {
        let job_store: Arc<dyn JobStore> = Arc::new(PostgresJobStore::new(pool.clone()));
        let outbox_store: Arc<dyn OutboxStore> = Arc::new(PostgresOutboxStore::new(pool.clone()));

        Self {
            pool,
            config,
            job_registry: Arc::new(job_registry),
            job_store,
            outbox_store,
            embedding_client,
            api_source_client,
        }
    }

    /// The subset of deps a job handler needs, bundled for `JobWorker`.
    pub fn job_deps(&self) -> Arc<JobDeps> {
        Arc::new(JobDeps {
            pool: self.pool.clone(),
            job_store: self.job_store.clone(),
            outbox_store: self.outbox_store.clone(),
            embedding_client: self.embedding_client.clone(),
            api_source_client: self.api_source_client.clone(),
            config: self.config.clone(),
        })
    }
}
