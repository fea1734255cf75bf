//! `digest.daily` handler (§4.E, optional): aggregates the last 24h of
//! notifications per recipient into a single outbox row.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;

use crate::domains::communications::model::Channel;
use crate::domains::communications::repo as communications_repo;
use crate::kernel::guards::{gated_enqueue, EmitRequest, GateOutcome, Urgency};

use super::super::processor::{HandlerOutcome, JobDeps};

#[derive(Debug, Deserialize)]
struct Payload {
    recipient: String,
}

pub async fn handle(payload: serde_json::Value, deps: Arc<JobDeps>) -> Result<HandlerOutcome> {
    let payload: Payload = serde_json::from_value(payload).context("malformed digest.daily payload")?;

    let since = Utc::now() - chrono::Duration::hours(24);
    let count = communications_repo::count_since_for_recipient(&deps.pool, &payload.recipient, since).await?;

    if count == 0 {
        tracing::debug!(recipient = %payload.recipient, "no activity in the last 24h, skipping digest");
        return Ok(HandlerOutcome::Skip);
    }

    let body = serde_json::json!({
        "kind": "digest.daily",
        "context": {
            "recipient": payload.recipient,
            "unread_count": count,
            "window_start": since,
        },
        "occurred_at": Utc::now(),
    });
    let dedup_grouping = Utc::now().format("%Y-%m-%d").to_string();
    let idempotency_key = format!("digest.daily:{}:{}", payload.recipient, dedup_grouping);

    let request = EmitRequest {
        kind: "digest.daily",
        recipient: &payload.recipient,
        dedup_grouping: &dedup_grouping,
        channel: Channel::Webhook,
        urgency: Urgency::Low,
    };

    match gated_enqueue(&deps.pool, &deps.config, request, "/hooks/agent", body, &idempotency_key).await? {
        GateOutcome::Emitted | GateOutcome::SuppressedToInApp => Ok(HandlerOutcome::Ok),
        GateOutcome::SkippedDuplicate => {
            tracing::debug!(recipient = %payload.recipient, "digest suppressed, duplicate within dedup window");
            Ok(HandlerOutcome::Skip)
        }
        GateOutcome::Deferred { delay } => Ok(HandlerOutcome::Defer(delay)),
    }
}
