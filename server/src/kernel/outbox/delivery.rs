//! Outbox delivery worker (§4.F) — drains deliverable rows, signs and POSTs
//! them, and applies the success/terminal/retry state machine.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::Config;
use crate::domains::communications::repo as communications_repo;

use super::model::OutboxMessage;
use super::signing::sign;
use super::ssrf::{check_destination, GuardResult};
use super::store::OutboxStore;

pub struct OutboxDelivery {
    store: Arc<dyn OutboxStore>,
    http: reqwest::Client,
    pool: sqlx::PgPool,
    config: Config,
}

impl OutboxDelivery {
    pub fn new(store: Arc<dyn OutboxStore>, pool: sqlx::PgPool, config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.outbox_http_timeout)
            .build()?;
        Ok(Self {
            store,
            http,
            pool,
            config,
        })
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!("outbox delivery worker starting");
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let lease_secs = (self.config.outbox_http_timeout.as_secs() as i64).max(1) * 2;
            let batch = match self.store.claim_batch(self.config.outbox_batch_size, lease_secs).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "failed to claim outbox batch");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(500)) => {}
                }
                continue;
            }

            for message in batch {
                self.deliver_one(message).await;
            }
        }
        info!("outbox delivery worker stopped");
    }

    async fn deliver_one(&self, message: OutboxMessage) {
        let url = format!("{}{}", self.config.outbox_base_url, message.destination);

        let parsed = match Url::parse(&url) {
            Ok(u) => u,
            Err(e) => {
                self.dead_letter(&message, None, &format!("invalid destination url: {e}")).await;
                return;
            }
        };
        let host = match parsed.host_str() {
            Some(h) => h.to_string(),
            None => {
                self.dead_letter(&message, None, "destination url has no host").await;
                return;
            }
        };
        let port = parsed.port_or_known_default().unwrap_or(443);

        match check_destination(&host, port, &self.config.ssrf_private_cidrs_allow).await {
            Ok(GuardResult::Blocked) => {
                warn!(outbox_id = %message.id, destination = %message.destination, "blocked by SSRF guard");
                self.dead_letter(&message, None, "blocked_destination").await;
                return;
            }
            Err(e) => {
                warn!(outbox_id = %message.id, error = %e, "SSRF guard resolution failed, treating as retryable");
                self.retry(&message, None, &format!("dns resolution failed: {e}")).await;
                return;
            }
            Ok(GuardResult::Allowed) => {}
        }

        let raw_body = message.body.to_string();
        let timestamp = Utc::now().timestamp();
        let signature = sign(&self.config.outbox_hmac_secret, timestamp, &raw_body);

        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-Hook-Timestamp", timestamp.to_string())
            .header("X-Hook-Signature", signature)
            .header("X-Hook-Idempotency", &message.idempotency_key)
            .body(raw_body);

        if let Some(token) = &self.config.outbox_hook_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!(outbox_id = %message.id, status = status.as_u16(), "webhook delivered");
                    if let Err(e) = self.store.mark_delivered(message.id, status.as_u16() as i32).await {
                        error!(outbox_id = %message.id, error = %e, "failed to mark delivered");
                    }
                    if let Err(e) =
                        communications_repo::record_outbound_webhook(&self.pool, &message).await
                    {
                        error!(outbox_id = %message.id, error = %e, "failed to record communication audit row");
                    }
                } else if is_terminal_status(status) {
                    warn!(outbox_id = %message.id, status = status.as_u16(), "webhook rejected, terminal");
                    self.dead_letter(&message, Some(status.as_u16() as i32), &format!("http {}", status.as_u16())).await;
                } else {
                    self.retry(&message, Some(status.as_u16() as i32), &format!("http {}", status.as_u16())).await;
                }
            }
            Err(e) => {
                self.retry(&message, None, &format!("network error: {e}")).await;
            }
        }
    }

    async fn retry(&self, message: &OutboxMessage, status: Option<i32>, error: &str) {
        let next_attempts = message.attempts + 1;
        if next_attempts >= self.config.outbox_max_attempts {
            warn!(outbox_id = %message.id, attempts = next_attempts, "max outbox attempts reached, terminal");
            self.dead_letter(message, status, error).await;
            return;
        }

        let delay = outbox_backoff(next_attempts, self.config.outbox_backoff_base, self.config.outbox_backoff_cap);
        warn!(outbox_id = %message.id, attempts = next_attempts, delay_secs = delay.as_secs(), error, "delivery failed, retrying");

        if let Err(e) = self
            .store
            .mark_retry(message.id, status, error, Utc::now() + chrono::Duration::from_std(delay).unwrap())
            .await
        {
            error!(outbox_id = %message.id, error = %e, "failed to record delivery retry");
        }
    }

    async fn dead_letter(&self, message: &OutboxMessage, status: Option<i32>, error: &str) {
        if let Err(e) = self.store.mark_dead_letter(message.id, status, error).await {
            error!(outbox_id = %message.id, error = %e, "failed to record dead letter");
        }
    }
}

fn is_terminal_status(status: StatusCode) -> bool {
    status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT && status != StatusCode::TOO_MANY_REQUESTS
}

/// `backoff(n) = min(cap, base * 2^(n-1)) + uniform_jitter(0, base)` (§4.F).
pub fn outbox_backoff(attempts: i32, base: Duration, cap: Duration) -> Duration {
    let n = attempts.max(1);
    let exp = base.as_secs_f64() * 2f64.powi(n - 1);
    let capped = exp.min(cap.as_secs_f64());
    let jitter = rand::thread_rng().gen_range(0.0..base.as_secs_f64().max(1.0));
    Duration::from_secs_f64(capped + jitter)
}
