//! Process configuration, loaded once at startup from the environment.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use std::env;
use std::time::Duration;

use crate::kernel::guards::QuietHours;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,

    /// Number of concurrent job processor workers.
    pub scheduler_workers: usize,
    /// Period of the cron safety-net sweep.
    pub scheduler_tick_interval: Duration,
    /// UTC hour at which the daily digest sweep fires.
    pub digest_hour_utc: u32,
    /// Terminal failure threshold for job handlers.
    pub job_max_attempts: i32,
    /// Default batch size claimed per worker poll.
    pub job_batch_size: i64,
    /// Lock duration granted to a claimed job.
    pub job_lock_duration: Duration,
    /// Base/cap for job handler retry backoff.
    pub job_backoff_base: Duration,
    pub job_backoff_cap: Duration,

    pub outbox_base_url: String,
    pub outbox_hook_token: Option<String>,
    pub outbox_hmac_secret: String,
    pub outbox_max_attempts: i32,
    pub outbox_backoff_base: Duration,
    pub outbox_backoff_cap: Duration,
    pub outbox_batch_size: i64,
    pub outbox_http_timeout: Duration,

    pub rate_window: Duration,
    pub rate_limit_default: u32,

    pub dedup_window: Duration,

    /// Operator-wide quiet-hours window (§4.H). This system has no
    /// recipient/user profile table to carry a per-person window, so the
    /// window is a single process-wide setting rather than per-recipient.
    pub quiet_hours: Option<QuietHours>,

    /// Comma-separated list of CIDRs exempt from the outbox SSRF guard.
    pub ssrf_private_cidrs_allow: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),

            scheduler_workers: parse_env("SCHEDULER_WORKERS", 4)?,
            scheduler_tick_interval: Duration::from_secs(parse_env("SCHEDULER_TICK_INTERVAL_SECS", 60)?),
            digest_hour_utc: parse_env("DIGEST_HOUR_UTC", 13)?,
            job_max_attempts: parse_env("JOB_MAX_ATTEMPTS", 10)?,
            job_batch_size: parse_env("JOB_BATCH_SIZE", 10)?,
            job_lock_duration: Duration::from_secs(parse_env("JOB_LOCK_DURATION_SECS", 60)?),
            job_backoff_base: Duration::from_secs(parse_env("JOB_BACKOFF_BASE_SECS", 60)?),
            job_backoff_cap: Duration::from_secs(parse_env("JOB_BACKOFF_CAP_SECS", 3600)?),

            outbox_base_url: env::var("OUTBOX_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            outbox_hook_token: env::var("OUTBOX_HOOK_TOKEN").ok(),
            outbox_hmac_secret: env::var("OUTBOX_HMAC_SECRET")
                .context("OUTBOX_HMAC_SECRET must be set")?,
            outbox_max_attempts: parse_env("OUTBOX_MAX_ATTEMPTS", 12)?,
            outbox_backoff_base: Duration::from_secs(parse_env("OUTBOX_BACKOFF_BASE_SECS", 30)?),
            outbox_backoff_cap: Duration::from_secs(parse_env("OUTBOX_BACKOFF_CAP_SECS", 3600)?),
            outbox_batch_size: parse_env("OUTBOX_BATCH_SIZE", 50)?,
            outbox_http_timeout: Duration::from_secs(parse_env("OUTBOX_HTTP_TIMEOUT_SECS", 10)?),

            rate_window: Duration::from_secs(parse_env("RATE_WINDOW_SECS", 60)?),
            rate_limit_default: parse_env("RATE_LIMIT_DEFAULT", 60)?,

            dedup_window: Duration::from_secs(parse_env("DEDUP_WINDOW_SECS", 600)?),

            quiet_hours: parse_quiet_hours()?,

            ssrf_private_cidrs_allow: env::var("SSRF_PRIVATE_CIDRS_ALLOW")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
        })
    }
}

/// Reads `QUIET_HOURS_START`/`QUIET_HOURS_END` (`HH:MM`, 24h). Both unset
/// means no quiet hours; one without the other is a configuration error.
fn parse_quiet_hours() -> Result<Option<QuietHours>> {
    let start = env::var("QUIET_HOURS_START").ok();
    let end = env::var("QUIET_HOURS_END").ok();

    match (start, end) {
        (Some(start), Some(end)) => {
            let start = NaiveTime::parse_from_str(&start, "%H:%M")
                .with_context(|| format!("QUIET_HOURS_START is malformed: {start}"))?;
            let end = NaiveTime::parse_from_str(&end, "%H:%M")
                .with_context(|| format!("QUIET_HOURS_END is malformed: {end}"))?;
            Ok(Some(QuietHours { start, end }))
        }
        (None, None) => Ok(None),
        _ => Err(anyhow::anyhow!(
            "QUIET_HOURS_START and QUIET_HOURS_END must both be set, or neither"
        )),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is malformed: {}", key, e)),
        Err(_) => Ok(default),
    }
}
