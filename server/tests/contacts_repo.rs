mod common;

use server_core::domains::contacts::model::{ContactableType, ContactType};
use server_core::domains::contacts::repo::{self, NewContact};

fn new_contact(contactable_id: uuid::Uuid, value: &str, is_primary: bool) -> NewContact {
    NewContact {
        name: "front desk".to_string(),
        contact_type: ContactType::Phone,
        value: value.to_string(),
        is_primary,
        contactable_type: ContactableType::WorkItem,
        contactable_id,
    }
}

#[tokio::test]
async fn creating_a_new_primary_contact_clears_the_previous_one() {
    let pool = common::test_pool().await;
    let owner = uuid::Uuid::new_v4();

    let first = repo::create(&pool, new_contact(owner, "555-0100", true)).await.unwrap();
    assert!(first.is_primary);

    let second = repo::create(&pool, new_contact(owner, "555-0101", true)).await.unwrap();
    assert!(second.is_primary);

    let refreshed_first = repo::find_by_id(&pool, first.id).await.unwrap().unwrap();
    assert!(!refreshed_first.is_primary, "the old primary contact must be cleared");
}

#[tokio::test]
async fn primary_clearing_is_scoped_to_contact_type_and_owner() {
    let pool = common::test_pool().await;
    let owner = uuid::Uuid::new_v4();
    let other_owner = uuid::Uuid::new_v4();

    let phone = repo::create(&pool, new_contact(owner, "555-0200", true)).await.unwrap();
    let mut email = new_contact(owner, "a@example.com", true);
    email.contact_type = ContactType::Email;
    let email = repo::create(&pool, email).await.unwrap();

    let unrelated = repo::create(&pool, new_contact(other_owner, "555-0300", true)).await.unwrap();

    let phone_after = repo::find_by_id(&pool, phone.id).await.unwrap().unwrap();
    let email_after = repo::find_by_id(&pool, email.id).await.unwrap().unwrap();
    let unrelated_after = repo::find_by_id(&pool, unrelated.id).await.unwrap().unwrap();

    assert!(phone_after.is_primary, "a different contact_type must not be cleared");
    assert!(email_after.is_primary);
    assert!(unrelated_after.is_primary, "a different owner must not be cleared");
}

#[tokio::test]
async fn list_for_owner_orders_primary_first() {
    let pool = common::test_pool().await;
    let owner = uuid::Uuid::new_v4();

    let secondary = repo::create(&pool, new_contact(owner, "555-0400", false)).await.unwrap();
    let primary = repo::create(&pool, new_contact(owner, "555-0401", true)).await.unwrap();

    let list = repo::list_for_owner(&pool, ContactableType::WorkItem, owner).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, primary.id);
    assert_eq!(list[1].id, secondary.id);
}
