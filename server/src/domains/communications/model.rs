//! Communication entity (§3, §10.F) — audit record of an actual inbound or
//! outbound message, distinct from the transient `OutboxMessage` queue row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::common::{CommunicationId, ContactId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Webhook,
    InApp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStatus {
    Received,
    Queued,
    Sent,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Communication {
    pub id: CommunicationId,
    pub direction: Direction,
    pub channel: Channel,
    pub contact_id: Option<ContactId>,
    pub subject: Option<String>,
    pub body: String,
    pub related_work_item_id: Option<uuid::Uuid>,
    pub status: CommunicationStatus,
    pub occurred_at: DateTime<Utc>,
}
