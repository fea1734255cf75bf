//! Contact entity (§3, §10.F) — a multi-channel endpoint owned by some entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::common::ContactId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactType {
    Phone,
    Email,
    Website,
    BookingUrl,
    Social,
    Address,
}

impl std::fmt::Display for ContactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContactType::Phone => "phone",
            ContactType::Email => "email",
            ContactType::Website => "website",
            ContactType::BookingUrl => "booking_url",
            ContactType::Social => "social",
            ContactType::Address => "address",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ContactType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phone" => Ok(ContactType::Phone),
            "email" => Ok(ContactType::Email),
            "website" => Ok(ContactType::Website),
            "booking_url" => Ok(ContactType::BookingUrl),
            "social" => Ok(ContactType::Social),
            "address" => Ok(ContactType::Address),
            other => Err(anyhow::anyhow!("unknown contact type: {other}")),
        }
    }
}

/// Polymorphic owner kind — what a `Contact` is a channel endpoint *for*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactableType {
    WorkItem,
    Person,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub contact_type: ContactType,
    pub value: String,
    pub is_primary: bool,
    pub contactable_type: ContactableType,
    pub contactable_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
