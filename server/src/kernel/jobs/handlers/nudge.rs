//! `nudge.work_item.not_after` handler (§4.E) — analogous to the reminder
//! handler, destination `/hooks/wake`, context carries `not_after`.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domains::communications::model::Channel;
use crate::domains::work_items::model::{WorkItem, WorkItemStatus};
use crate::kernel::guards::{gated_enqueue, EmitRequest, GateOutcome, Urgency};

use super::super::processor::{HandlerOutcome, JobDeps};

#[derive(Debug, Deserialize)]
struct Payload {
    work_item_id: crate::common::WorkItemId,
    not_after: DateTime<Utc>,
}

pub async fn handle(payload: serde_json::Value, deps: Arc<JobDeps>) -> Result<HandlerOutcome> {
    let payload: Payload = serde_json::from_value(payload).context("malformed nudge.work_item.not_after payload")?;

    let work_item = WorkItem::find_by_id(payload.work_item_id, &deps.pool).await?;
    let Some(work_item) = work_item else {
        tracing::debug!(work_item_id = %payload.work_item_id, "nudge target missing, skipping");
        return Ok(HandlerOutcome::Skip);
    };

    if matches!(work_item.status, WorkItemStatus::Done | WorkItemStatus::Cancelled) {
        tracing::debug!(work_item_id = %payload.work_item_id, status = ?work_item.status, "nudge moot, work item terminal");
        return Ok(HandlerOutcome::Skip);
    }

    let body = serde_json::json!({
        "kind": "nudge.work_item.not_after",
        "context": {
            "work_item_id": work_item.id.into_uuid(),
            "title": work_item.title,
            "not_after": payload.not_after,
        },
        "occurred_at": Utc::now(),
    });
    let idempotency_key = format!(
        "nudge.work_item.not_after:{}:{}",
        work_item.id,
        payload.not_after.to_rfc3339()
    );
    let dedup_grouping = work_item.id.to_string();

    let request = EmitRequest {
        kind: "nudge.work_item.not_after",
        recipient: "/hooks/wake",
        dedup_grouping: &dedup_grouping,
        channel: Channel::Webhook,
        urgency: Urgency::Normal,
    };

    match gated_enqueue(&deps.pool, &deps.config, request, "/hooks/wake", body, &idempotency_key).await? {
        GateOutcome::Emitted | GateOutcome::SuppressedToInApp => Ok(HandlerOutcome::Ok),
        GateOutcome::SkippedDuplicate => {
            tracing::debug!(work_item_id = %work_item.id, "nudge suppressed, duplicate within dedup window");
            Ok(HandlerOutcome::Skip)
        }
        GateOutcome::Deferred { delay } => Ok(HandlerOutcome::Defer(delay)),
    }
}
