mod common;

use server_core::domains::memories::model::MemoryType;
use server_core::domains::memories::repo::{self as memories_repo, NewMemory};
use server_core::kernel::search::{search_memories, SearchFilters, SearchType};

fn filters(caller_email: &str) -> SearchFilters {
    SearchFilters {
        namespaces: vec![],
        tags: vec![],
        memory_type: None,
        caller_email: caller_email.to_string(),
        granted_namespaces: vec![],
        limit: 10,
        offset: 0,
        vector_weight: 0.7,
        text_weight: 0.3,
    }
}

#[tokio::test]
async fn search_memories_finds_lexical_matches_and_reports_text_only_without_an_embedder() {
    let pool = common::test_pool().await;
    let owner = "searcher@example.com";

    memories_repo::create(
        &pool,
        NewMemory {
            namespace: "default".to_string(),
            memory_type: MemoryType::Fact,
            title: "Favorite espresso machine".to_string(),
            content: "the Gaggia Classic Pro makes excellent espresso".to_string(),
            tags: vec!["coffee".to_string()],
            importance: 6,
            user_email: owner.to_string(),
            work_item_id: None,
            contact_id: None,
        },
    )
    .await
    .unwrap();

    memories_repo::create(
        &pool,
        NewMemory {
            namespace: "default".to_string(),
            memory_type: MemoryType::Fact,
            title: "Unrelated fact".to_string(),
            content: "completely different subject matter entirely".to_string(),
            tags: vec![],
            importance: 3,
            user_email: owner.to_string(),
            work_item_id: None,
            contact_id: None,
        },
    )
    .await
    .unwrap();

    let outcome = search_memories(&pool, "espresso machine", &filters(owner), None).await.unwrap();

    assert_eq!(outcome.search_type, SearchType::Text);
    assert!(!outcome.results.is_empty());
    assert!(outcome.results.iter().any(|r| r.row.title.contains("espresso")));
}

#[tokio::test]
async fn search_memories_excludes_rows_outside_caller_access() {
    let pool = common::test_pool().await;

    memories_repo::create(
        &pool,
        NewMemory {
            namespace: "private-ns".to_string(),
            memory_type: MemoryType::Preference,
            title: "Secret preference".to_string(),
            content: "prefers quiet mornings without interruption".to_string(),
            tags: vec![],
            importance: 5,
            user_email: "owner@example.com".to_string(),
            work_item_id: None,
            contact_id: None,
        },
    )
    .await
    .unwrap();

    let outcome = search_memories(&pool, "quiet mornings", &filters("stranger@example.com"), None)
        .await
        .unwrap();

    assert!(outcome.results.is_empty(), "a caller without a namespace grant must not see another user's memory");
}
