//! OutboxMessage model (§3) — durable at-least-once webhook delivery queue row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::common::OutboxMessageId;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: OutboxMessageId,
    pub kind: String,
    pub destination: String,
    pub body: serde_json::Value,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub dead_letter: bool,
    pub last_status: Option<i32>,
    pub last_error: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn is_deliverable(&self, now: DateTime<Utc>) -> bool {
        self.delivered_at.is_none() && !self.dead_letter && self.next_attempt_at <= now
    }
}
