mod common;

use std::time::Duration;

use server_core::config::Config;
use server_core::domains::communications::model::Channel;
use server_core::kernel::guards::dedup;
use server_core::kernel::guards::rate_limit::{self, RateDecision};
use server_core::kernel::guards::{gated_enqueue, EmitRequest, GateOutcome, QuietHours, Urgency};

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        bind_addr: String::new(),
        scheduler_workers: 1,
        scheduler_tick_interval: Duration::from_secs(60),
        digest_hour_utc: 13,
        job_max_attempts: 10,
        job_batch_size: 10,
        job_lock_duration: Duration::from_secs(60),
        job_backoff_base: Duration::from_secs(60),
        job_backoff_cap: Duration::from_secs(3600),
        outbox_base_url: String::new(),
        outbox_hook_token: None,
        outbox_hmac_secret: "test-secret".to_string(),
        outbox_max_attempts: 12,
        outbox_backoff_base: Duration::from_secs(30),
        outbox_backoff_cap: Duration::from_secs(3600),
        outbox_batch_size: 50,
        outbox_http_timeout: Duration::from_secs(10),
        rate_window: Duration::from_secs(60),
        rate_limit_default: 3,
        dedup_window: Duration::from_secs(60),
        quiet_hours: None,
        ssrf_private_cidrs_allow: Vec::new(),
    }
}

#[tokio::test]
async fn dedup_check_and_record_skips_within_window_then_allows_after_refresh() {
    let pool = common::test_pool().await;
    let key = dedup::dedup_key("reminder.work_item.not_before", "alice@example.com", "wi-1");

    let mut tx = pool.begin().await.unwrap();
    let first = dedup::check_and_record(&mut tx, &key, Duration::from_secs(60)).await.unwrap();
    tx.commit().await.unwrap();
    assert!(first);

    let mut tx = pool.begin().await.unwrap();
    let second = dedup::check_and_record(&mut tx, &key, Duration::from_secs(60)).await.unwrap();
    tx.commit().await.unwrap();
    assert!(!second, "a repeat within the window must be suppressed");
}

#[tokio::test]
async fn rate_limit_defers_once_the_bucket_exceeds_its_limit() {
    let pool = common::test_pool().await;
    let recipient = "rate-test@example.com";

    for _ in 0..3 {
        let mut tx = pool.begin().await.unwrap();
        let decision = rate_limit::check_and_increment(&mut tx, recipient, "webhook", Duration::from_secs(60), 3)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(decision, RateDecision::Proceed));
    }

    let mut tx = pool.begin().await.unwrap();
    let decision = rate_limit::check_and_increment(&mut tx, recipient, "webhook", Duration::from_secs(60), 3)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert!(matches!(decision, RateDecision::Defer { .. }));
}

fn request<'a>(recipient: &'a str, dedup_grouping: &'a str) -> EmitRequest<'a> {
    EmitRequest {
        kind: "test.kind",
        recipient,
        dedup_grouping,
        channel: Channel::Webhook,
        urgency: Urgency::Normal,
    }
}

#[tokio::test]
async fn gated_enqueue_writes_an_outbox_row_on_first_emission() {
    let pool = common::test_pool().await;
    let config = test_config();

    let outcome = gated_enqueue(
        &pool,
        &config,
        request("first@example.com", "g1"),
        "/hooks/agent",
        serde_json::json!({"n": 1}),
        "test.kind:g1:1",
    )
    .await
    .unwrap();

    assert!(matches!(outcome, GateOutcome::Emitted));
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM outbox_messages WHERE idempotency_key = $1")
        .bind("test.kind:g1:1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn gated_enqueue_suppresses_a_duplicate_within_the_dedup_window() {
    let pool = common::test_pool().await;
    let config = test_config();

    gated_enqueue(
        &pool,
        &config,
        request("dup@example.com", "g2"),
        "/hooks/agent",
        serde_json::json!({}),
        "test.kind:g2:1",
    )
    .await
    .unwrap();

    let second = gated_enqueue(
        &pool,
        &config,
        request("dup@example.com", "g2"),
        "/hooks/agent",
        serde_json::json!({}),
        "test.kind:g2:2",
    )
    .await
    .unwrap();

    assert!(matches!(second, GateOutcome::SkippedDuplicate));
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM outbox_messages WHERE kind = 'test.kind'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "the suppressed duplicate must not add a second outbox row");
}

#[tokio::test]
async fn gated_enqueue_defers_once_the_recipient_channel_bucket_is_full() {
    let pool = common::test_pool().await;
    let mut config = test_config();
    config.rate_limit_default = 1;

    let recipient = "rate-gate@example.com";
    let first = gated_enqueue(
        &pool,
        &config,
        request(recipient, "g3"),
        "/hooks/agent",
        serde_json::json!({}),
        "test.kind:g3:1",
    )
    .await
    .unwrap();
    assert!(matches!(first, GateOutcome::Emitted));

    let second = gated_enqueue(
        &pool,
        &config,
        request(recipient, "g4"),
        "/hooks/agent",
        serde_json::json!({}),
        "test.kind:g4:1",
    )
    .await
    .unwrap();
    assert!(matches!(second, GateOutcome::Deferred { .. }));
}

#[tokio::test]
async fn gated_enqueue_collapses_to_in_app_during_quiet_hours_for_normal_urgency() {
    let pool = common::test_pool().await;
    let mut config = test_config();
    config.quiet_hours = Some(QuietHours {
        start: chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        end: chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
    });

    let outcome = gated_enqueue(
        &pool,
        &config,
        request("quiet@example.com", "g5"),
        "/hooks/agent",
        serde_json::json!({}),
        "test.kind:g5:1",
    )
    .await
    .unwrap();

    assert!(matches!(outcome, GateOutcome::SuppressedToInApp));

    let outbox_count: i64 = sqlx::query_scalar("SELECT count(*) FROM outbox_messages WHERE idempotency_key = $1")
        .bind("test.kind:g5:1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(outbox_count, 0, "quiet hours must not also emit the webhook row");

    let in_app_count: i64 =
        sqlx::query_scalar("SELECT count(*) FROM communications WHERE channel = 'in_app' AND subject = 'test.kind'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(in_app_count, 1);
}
