//! Emission gate (§4.H) — the single choke point every outbox-emitting
//! handler goes through: dedup, then rate limit, then quiet hours, with the
//! dedup record, rate bucket bump, and resulting row committed in one
//! transaction so a crash between checks can't desynchronize them from the
//! emit they guard.

use anyhow::Result;
use sqlx::PgPool;

use crate::config::Config;
use crate::domains::communications::model::{Channel, CommunicationStatus, Direction};

use super::dedup;
use super::quiet_hours::{self, QuietHoursDecision, Urgency};
use super::rate_limit::{self, RateDecision};

/// What a handler's emit attempt actually resolved to, once the gate ran.
pub enum GateOutcome {
    /// Passed every check; the outbox row is committed.
    Emitted,
    /// Quiet hours collapsed delivery to an in-app audit row instead of the
    /// outbox (no webhook will fire).
    SuppressedToInApp,
    /// A dedup entry was already live for this key within the window.
    SkippedDuplicate,
    /// The recipient/channel rate bucket is full; retry after `delay`.
    Deferred { delay: std::time::Duration },
}

pub struct EmitRequest<'a> {
    pub kind: &'a str,
    pub recipient: &'a str,
    pub dedup_grouping: &'a str,
    pub channel: Channel,
    pub urgency: Urgency,
}

fn channel_label(channel: Channel) -> &'static str {
    match channel {
        Channel::Email => "email",
        Channel::Sms => "sms",
        Channel::Webhook => "webhook",
        Channel::InApp => "in_app",
    }
}

pub async fn gated_enqueue(
    pool: &PgPool,
    config: &Config,
    request: EmitRequest<'_>,
    destination: &str,
    body: serde_json::Value,
    idempotency_key: &str,
) -> Result<GateOutcome> {
    let mut tx = pool.begin().await?;

    let key = dedup::dedup_key(request.kind, request.recipient, request.dedup_grouping);
    if !dedup::check_and_record(&mut tx, &key, config.dedup_window).await? {
        tx.commit().await?;
        return Ok(GateOutcome::SkippedDuplicate);
    }

    match rate_limit::check_and_increment(
        &mut tx,
        request.recipient,
        channel_label(request.channel),
        config.rate_window,
        config.rate_limit_default as i32,
    )
    .await?
    {
        RateDecision::Defer { delay } => {
            tx.commit().await?;
            return Ok(GateOutcome::Deferred { delay });
        }
        RateDecision::Proceed => {}
    }

    let decision = quiet_hours::apply(config.quiet_hours, request.urgency, request.channel, chrono::Utc::now());

    match decision {
        QuietHoursDecision::Proceed { .. } => {
            sqlx::query(
                r#"
                INSERT INTO outbox_messages (kind, destination, body, idempotency_key)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (kind, idempotency_key) DO NOTHING
                "#,
            )
            .bind(request.kind)
            .bind(destination)
            .bind(body)
            .bind(idempotency_key)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(GateOutcome::Emitted)
        }
        QuietHoursDecision::SuppressToInApp => {
            sqlx::query(
                r#"
                INSERT INTO communications (direction, channel, contact_id, subject, body, status, occurred_at)
                VALUES ($1, $2, NULL, $3, $4, $5, now())
                "#,
            )
            .bind(Direction::Outbound)
            .bind(Channel::InApp)
            .bind(request.kind)
            .bind(body.to_string())
            .bind(CommunicationStatus::Sent)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(GateOutcome::SuppressedToInApp)
        }
    }
}
