mod common;

use server_core::domains::communications::repo;
use server_core::domains::contacts::model::{ContactableType, ContactType};
use server_core::domains::contacts::repo as contacts_repo;
use server_core::kernel::outbox::OutboxMessage;

#[tokio::test]
async fn count_since_for_recipient_only_counts_matching_contact_and_window() {
    let pool = common::test_pool().await;

    let contact = contacts_repo::create(
        &pool,
        contacts_repo::NewContact {
            name: "agent inbox".to_string(),
            contact_type: ContactType::Email,
            value: "agent@example.com".to_string(),
            is_primary: true,
            contactable_type: ContactableType::Person,
            contactable_id: uuid::Uuid::new_v4(),
        },
    )
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO communications (direction, channel, contact_id, body, status, occurred_at) \
         VALUES ('inbound', 'email', $1, 'hello', 'received', now())",
    )
    .bind(contact.id)
    .execute(&pool)
    .await
    .unwrap();

    let since = chrono::Utc::now() - chrono::Duration::hours(1);
    let count = repo::count_since_for_recipient(&pool, "agent@example.com", since).await.unwrap();
    assert_eq!(count, 1);

    let count_other = repo::count_since_for_recipient(&pool, "nobody@example.com", since).await.unwrap();
    assert_eq!(count_other, 0);

    let future_window = chrono::Utc::now() + chrono::Duration::hours(1);
    let count_future = repo::count_since_for_recipient(&pool, "agent@example.com", future_window).await.unwrap();
    assert_eq!(count_future, 0);
}

#[tokio::test]
async fn record_outbound_webhook_writes_a_sent_row() {
    let pool = common::test_pool().await;

    let message = OutboxMessage {
        id: server_core::common::OutboxMessageId::new(),
        kind: "digest.daily".to_string(),
        destination: "/hooks/agent".to_string(),
        body: serde_json::json!({"count": 3}),
        attempts: 1,
        next_attempt_at: chrono::Utc::now(),
        delivered_at: None,
        dead_letter: false,
        last_status: Some(200),
        last_error: None,
        idempotency_key: "digest:1".to_string(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    repo::record_outbound_webhook(&pool, &message).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM communications WHERE channel = 'webhook' AND status = 'sent'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
