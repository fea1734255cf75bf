//! Job model (component D data shape, §3 "Job").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::common::JobId;

/// Closed set of job kinds, replacing the source's dynamic string-keyed
/// callback dispatch with a tagged variant + registry (§9 REDESIGN FLAGS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ReminderWorkItemNotBefore,
    NudgeWorkItemNotAfter,
    ApiRefresh,
    DigestDaily,
}

impl JobKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobKind::ReminderWorkItemNotBefore => "reminder.work_item.not_before",
            JobKind::NudgeWorkItemNotAfter => "nudge.work_item.not_after",
            JobKind::ApiRefresh => "api.refresh",
            JobKind::DigestDaily => "digest.daily",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reminder.work_item.not_before" => Ok(JobKind::ReminderWorkItemNotBefore),
            "nudge.work_item.not_after" => Ok(JobKind::NudgeWorkItemNotAfter),
            "api.refresh" => Ok(JobKind::ApiRefresh),
            "digest.daily" => Ok(JobKind::DigestDaily),
            other => Err(anyhow::anyhow!("unknown job kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: String,
    pub payload: serde_json::Value,
    pub run_at: DateTime<Utc>,
    pub attempts: i32,
    pub locked_by: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// True iff this row satisfies §3's claimable invariant, evaluated in-process
    /// (the store's SQL re-implements the same predicate for the real claim race).
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.completed_at.is_none()
            && self.run_at <= now
            && (self.locked_by.is_none() || self.locked_until.map(|until| until < now).unwrap_or(false))
    }

    pub fn kind_typed(&self) -> anyhow::Result<JobKind> {
        self.kind.parse()
    }
}

/// Result of enqueueing a job — distinguishes a fresh insert from a
/// deduplicated no-op so callers (and tests) can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Created(Uuid),
    Duplicate(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_job(now: DateTime<Utc>) -> Job {
        Job {
            id: JobId::new(),
            kind: JobKind::ApiRefresh.to_string(),
            payload: serde_json::json!({}),
            run_at: now,
            attempts: 0,
            locked_by: None,
            locked_until: None,
            completed_at: None,
            last_error: None,
            idempotency_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn claimable_when_due_and_unlocked() {
        let now = Utc::now();
        let job = base_job(now - chrono::Duration::seconds(1));
        assert!(job.is_claimable(now));
    }

    #[test]
    fn not_claimable_when_run_at_in_future() {
        let now = Utc::now();
        let job = base_job(now + chrono::Duration::seconds(60));
        assert!(!job.is_claimable(now));
    }

    #[test]
    fn not_claimable_when_completed() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.completed_at = Some(now);
        assert!(!job.is_claimable(now));
    }

    #[test]
    fn not_claimable_while_lock_is_live() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.locked_by = Some("worker-1".into());
        job.locked_until = Some(now + chrono::Duration::seconds(30));
        assert!(!job.is_claimable(now));
    }

    #[test]
    fn claimable_again_once_lock_expired() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.locked_by = Some("worker-1".into());
        job.locked_until = Some(now - chrono::Duration::seconds(1));
        assert!(job.is_claimable(now));
    }

    #[test]
    fn job_kind_round_trips_through_string() {
        for kind in [
            JobKind::ReminderWorkItemNotBefore,
            JobKind::NudgeWorkItemNotAfter,
            JobKind::ApiRefresh,
            JobKind::DigestDaily,
        ] {
            let parsed: JobKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        assert!("not.a.kind".parse::<JobKind>().is_err());
    }
}
