//! `api.refresh` handler (§4.E): re-fetches a named external API spec,
//! updates derived memories, and enqueues an outbox row reporting the diff.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;

use crate::domains::communications::model::Channel;
use crate::kernel::guards::{gated_enqueue, EmitRequest, GateOutcome, Urgency};

use super::super::processor::{HandlerOutcome, JobDeps};

#[derive(Debug, Deserialize)]
struct Payload {
    api_source_id: uuid::Uuid,
}

pub async fn handle(payload: serde_json::Value, deps: Arc<JobDeps>) -> Result<HandlerOutcome> {
    let payload: Payload = serde_json::from_value(payload).context("malformed api.refresh payload")?;

    let Some(client) = deps.api_source_client.clone() else {
        tracing::debug!(api_source_id = %payload.api_source_id, "no api source client configured, skipping refresh");
        return Ok(HandlerOutcome::Skip);
    };

    let diff = match client.refresh(payload.api_source_id).await {
        Ok(diff) => diff,
        Err(err) => return Ok(HandlerOutcome::RetryableFailure(err.to_string())),
    };

    if diff.is_empty() {
        tracing::debug!(api_source_id = %payload.api_source_id, "api refresh produced no changes, skipping report");
        return Ok(HandlerOutcome::Skip);
    }

    let body = serde_json::json!({
        "kind": "api.refresh",
        "context": {
            "api_source_id": payload.api_source_id,
            "created": diff.created,
            "updated": diff.updated,
            "deleted": diff.deleted,
        },
        "occurred_at": Utc::now(),
    });
    let idempotency_key = format!("api.refresh:{}:{}", payload.api_source_id, Utc::now().timestamp());
    let dedup_grouping = payload.api_source_id.to_string();

    let request = EmitRequest {
        kind: "api.refresh",
        recipient: "/hooks/agent",
        dedup_grouping: &dedup_grouping,
        channel: Channel::Webhook,
        urgency: Urgency::Low,
    };

    match gated_enqueue(&deps.pool, &deps.config, request, "/hooks/agent", body, &idempotency_key).await? {
        GateOutcome::Emitted | GateOutcome::SuppressedToInApp => Ok(HandlerOutcome::Ok),
        GateOutcome::SkippedDuplicate => {
            tracing::debug!(api_source_id = %payload.api_source_id, "api refresh report suppressed, duplicate within dedup window");
            Ok(HandlerOutcome::Skip)
        }
        GateOutcome::Deferred { delay } => Ok(HandlerOutcome::Defer(delay)),
    }
}
