//! Contacts repository.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::ContactId;

use super::model::{Contact, ContactType, ContactableType};

pub struct NewContact {
    pub name: String,
    pub contact_type: ContactType,
    pub value: String,
    pub is_primary: bool,
    pub contactable_type: ContactableType,
    pub contactable_id: Uuid,
}

pub async fn create(pool: &PgPool, new_contact: NewContact) -> Result<Contact> {
    let mut tx = pool.begin().await?;

    if new_contact.is_primary {
        sqlx::query(
            "UPDATE contacts SET is_primary = false \
             WHERE contactable_type = $1 AND contactable_id = $2 AND contact_type = $3",
        )
        .bind(new_contact.contactable_type)
        .bind(new_contact.contactable_id)
        .bind(new_contact.contact_type)
        .execute(&mut *tx)
        .await?;
    }

    let contact: Contact = sqlx::query_as(
        r#"
        INSERT INTO contacts (name, contact_type, value, is_primary, contactable_type, contactable_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&new_contact.name)
    .bind(new_contact.contact_type)
    .bind(&new_contact.value)
    .bind(new_contact.is_primary)
    .bind(new_contact.contactable_type)
    .bind(new_contact.contactable_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(contact)
}

pub async fn find_by_id(pool: &PgPool, id: ContactId) -> Result<Option<Contact>> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

pub async fn list_for_owner(
    pool: &PgPool,
    contactable_type: ContactableType,
    contactable_id: Uuid,
) -> Result<Vec<Contact>> {
    sqlx::query_as::<_, Contact>(
        "SELECT * FROM contacts WHERE contactable_type = $1 AND contactable_id = $2 \
         ORDER BY is_primary DESC, created_at ASC",
    )
    .bind(contactable_type)
    .bind(contactable_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn delete(pool: &PgPool, id: ContactId) -> Result<()> {
    sqlx::query("DELETE FROM contacts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
