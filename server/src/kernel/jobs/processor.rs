//! Job processor (component E) — the worker pool that claims, dispatches, and
//! completes/retries/dead-letters jobs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::common::JobId;
use crate::config::Config;
use crate::kernel::api_source::ApiSourceClient;
use crate::kernel::embedding::EmbeddingClient;
use crate::kernel::outbox::store::OutboxStore;

use super::model::{Job, JobKind};
use super::registry::JobRegistry;
use super::store::JobStore;

/// The outcome a handler reports for a single job (§4.E.3).
pub enum HandlerOutcome {
    Ok,
    Skip,
    /// The emission gate (§4.H) deferred the job rather than failing it —
    /// a rate bucket is full. Re-run after `delay` without counting against
    /// the handler as a failure.
    Defer(Duration),
    RetryableFailure(String),
    TerminalFailure(String),
}

/// Dependencies shared by every job handler: the store/outbox adapters and
/// whatever external collaborators (embedding client) a handler needs.
pub struct JobDeps {
    pub pool: PgPool,
    pub job_store: Arc<dyn JobStore>,
    pub outbox_store: Arc<dyn OutboxStore>,
    pub embedding_client: Option<Arc<dyn EmbeddingClient>>,
    pub api_source_client: Option<Arc<dyn ApiSourceClient>>,
    pub config: Config,
}

#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    pub batch_size: i64,
    pub lock_duration: Duration,
    pub poll_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub max_attempts: i32,
    pub worker_id: String,
}

impl JobWorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.job_batch_size,
            lock_duration: config.job_lock_duration,
            poll_interval: Duration::from_secs(1),
            backoff_base: config.job_backoff_base,
            backoff_cap: config.job_backoff_cap,
            max_attempts: config.job_max_attempts,
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }

    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }
}

/// `delay_seconds = base · 2^attempts + jitter`, capped (§4.E.3).
pub fn retry_backoff(attempts: i32, base: Duration, cap: Duration) -> Duration {
    let exp = base.as_secs_f64() * 2f64.powi(attempts.max(0));
    let capped = exp.min(cap.as_secs_f64());
    let jitter = rand::thread_rng().gen_range(0.0..base.as_secs_f64().max(1.0));
    Duration::from_secs_f64(capped + jitter)
}

pub struct JobWorker {
    deps: Arc<JobDeps>,
    registry: Arc<JobRegistry>,
    config: JobWorkerConfig,
}

impl JobWorker {
    pub fn new(deps: Arc<JobDeps>, registry: Arc<JobRegistry>, config: JobWorkerConfig) -> Self {
        Self {
            deps,
            registry,
            config,
        }
    }

    /// Runs the worker loop until `shutdown` is cancelled. Finishes any jobs
    /// claimed before shutdown; never interrupts a handler mid-flight.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(worker_id = %self.config.worker_id, "job worker starting");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let jobs = match self
                .deps
                .job_store
                .claim(&self.config.worker_id, self.config.batch_size, self.config.lock_duration)
                .await
            {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if jobs.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
                continue;
            }

            debug!(count = jobs.len(), worker_id = %self.config.worker_id, "claimed jobs");

            let handles: Vec<_> = jobs.into_iter().map(|job| self.process_job(job)).collect();
            futures::future::join_all(handles).await;
        }

        info!(worker_id = %self.config.worker_id, "job worker stopped");
    }

    async fn process_job(&self, job: Job) {
        let job_id = job.id;
        let kind = match job.kind_typed() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(job_id = %job_id, kind = %job.kind, error = %e, "unknown job kind, terminal failure");
                self.finish_terminal(job_id, &format!("unknown job kind: {}", job.kind)).await;
                return;
            }
        };

        if !self.registry.is_registered(kind) {
            warn!(job_id = %job_id, kind = %kind, "no handler registered, terminal failure");
            self.finish_terminal(job_id, &format!("no handler registered for {}", kind)).await;
            return;
        }

        let outcome = self
            .registry
            .dispatch(kind, job.payload.clone(), self.deps.clone())
            .await;

        match outcome {
            Ok(HandlerOutcome::Ok) => {
                debug!(job_id = %job_id, kind = %kind, "job succeeded");
                self.mark_complete(job_id).await;
            }
            Ok(HandlerOutcome::Skip) => {
                debug!(job_id = %job_id, kind = %kind, "job skipped (moot)");
                self.mark_complete(job_id).await;
            }
            Ok(HandlerOutcome::Defer(delay)) => {
                debug!(job_id = %job_id, kind = %kind, delay_secs = delay.as_secs(), "job deferred by rate limit");
                if let Err(e) = self
                    .deps
                    .job_store
                    .fail(job_id, &self.config.worker_id, "deferred: recipient rate limit window active", delay)
                    .await
                {
                    error!(job_id = %job_id, error = %e, "failed to defer rate-limited job");
                }
            }
            Ok(HandlerOutcome::RetryableFailure(err)) => {
                self.retry_or_dead_letter(&job, &err).await;
            }
            Ok(HandlerOutcome::TerminalFailure(err)) => {
                warn!(job_id = %job_id, kind = %kind, error = %err, "job terminally failed");
                self.finish_terminal(job_id, &err).await;
            }
            Err(err) => {
                self.retry_or_dead_letter(&job, &err.to_string()).await;
            }
        }
    }

    async fn retry_or_dead_letter(&self, job: &Job, error: &str) {
        let job_id = job.id;
        if job.attempts + 1 >= self.config.max_attempts {
            warn!(job_id = %job_id, attempts = job.attempts + 1, error, "max attempts reached, terminal failure");
            self.finish_terminal(job_id, error).await;
            return;
        }

        let delay = retry_backoff(job.attempts, self.config.backoff_base, self.config.backoff_cap);
        warn!(job_id = %job_id, attempts = job.attempts + 1, delay_secs = delay.as_secs(), error, "job failed, scheduling retry");

        if let Err(e) = self
            .deps
            .job_store
            .fail(job_id, &self.config.worker_id, error, delay)
            .await
        {
            error!(job_id = %job_id, error = %e, "failed to record job failure");
        }
    }

    async fn mark_complete(&self, job_id: JobId) {
        if let Err(e) = self.deps.job_store.complete(job_id, &self.config.worker_id).await {
            error!(job_id = %job_id, error = %e, "failed to mark job complete");
        }
    }

    /// Terminal failure: complete the job (no further retries) and emit a
    /// dead-letter outbox row describing the failure (§4.E.3).
    async fn finish_terminal(&self, job_id: JobId, error: &str) {
        self.mark_complete(job_id).await;

        let idempotency_key = format!("dead_letter:{}", job_id);
        let body = serde_json::json!({
            "kind": "dead_letter",
            "context": { "job_id": job_id.into_uuid(), "error": error },
            "occurred_at": chrono::Utc::now(),
        });

        if let Err(e) = self
            .deps
            .outbox_store
            .enqueue("dead_letter", "/hooks/dead-letter", body, &idempotency_key)
            .await
        {
            error!(job_id = %job_id, error = %e, "failed to enqueue dead-letter outbox row");
        }
    }
}

pub async fn pending_counts(job_store: &dyn JobStore) -> anyhow::Result<HashMap<String, i64>> {
    Ok(job_store.pending_counts().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempts() {
        let base = Duration::from_secs(60);
        let cap = Duration::from_secs(3600);
        // Compare the deterministic floor (jitter only adds).
        let floor_0 = 60.0 * 2f64.powi(0);
        let floor_3 = 60.0 * 2f64.powi(3);
        assert!(floor_3 > floor_0);
        let d0 = retry_backoff(0, base, cap);
        let d3 = retry_backoff(3, base, cap);
        assert!(d0.as_secs_f64() >= floor_0);
        assert!(d3.as_secs_f64() >= floor_3);
    }

    #[test]
    fn backoff_never_exceeds_cap_plus_jitter_bound() {
        let base = Duration::from_secs(60);
        let cap = Duration::from_secs(3600);
        let d = retry_backoff(20, base, cap);
        assert!(d.as_secs_f64() <= cap.as_secs_f64() + base.as_secs_f64());
    }

    #[test]
    fn job_kind_used_in_dead_letter_key_is_deterministic() {
        let id = JobId::new();
        let key_a = format!("dead_letter:{}", id);
        let key_b = format!("dead_letter:{}", id);
        assert_eq!(key_a, key_b);
    }
}
