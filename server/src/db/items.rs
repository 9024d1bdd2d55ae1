//! Server-side persistence for items (§6.1), backed by Postgres.
//!
//! Distinct from [`pocket_engine::storage::StorageAdapter`]: the server
//! does not normalize tags into their own table or track per-tag frecency.
//! That modeling lives in the client-side engine, not here.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use pocket_engine::sync::wire::ClientItem;

/// A row from the server's `items` table.
#[derive(Debug, Clone)]
pub struct StoredItem {
    pub id: uuid::Uuid,
    pub profile_id: String,
    pub sync_id: String,
    pub item_type: String,
    pub content: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredItem {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredItem {
            id: row.try_get("id")?,
            profile_id: row.try_get("profile_id")?,
            sync_id: row.try_get("sync_id")?,
            item_type: row.try_get("item_type")?,
            content: row.try_get("content")?,
            metadata: row.try_get("metadata")?,
            tags: serde_json::from_value(row.try_get("tags")?).unwrap_or_default(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// All live items for a profile, ordered newest-updated last so the client
/// sees a stable enumeration across pages.
pub async fn get_items(pool: &PgPool, profile_id: &str) -> Result<Vec<StoredItem>, sqlx::Error> {
    sqlx::query_as::<_, StoredItem>(
        r#"
        SELECT id, profile_id, sync_id, item_type, content, metadata, tags, created_at, updated_at
        FROM items
        WHERE profile_id = $1
        ORDER BY updated_at ASC
        "#,
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await
}

/// Items updated after `since` (§6.1 `/items/since/{isoTimestamp}`).
pub async fn get_items_since(
    pool: &PgPool,
    profile_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<StoredItem>, sqlx::Error> {
    sqlx::query_as::<_, StoredItem>(
        r#"
        SELECT id, profile_id, sync_id, item_type, content, metadata, tags, created_at, updated_at
        FROM items
        WHERE profile_id = $1 AND updated_at > $2
        ORDER BY updated_at ASC
        "#,
    )
    .bind(profile_id)
    .bind(since)
    .fetch_all(pool)
    .await
}

/// Upsert contract of §6.1: the server matches incoming `sync_id`
/// exclusively within a profile. Returns the server id and whether the row
/// was newly created.
pub async fn upsert_item(
    pool: &PgPool,
    profile_id: &str,
    item: &ClientItem,
) -> Result<(uuid::Uuid, bool), sqlx::Error> {
    let tags = serde_json::to_value(&item.tags).unwrap_or(serde_json::Value::Array(vec![]));

    let row: (uuid::Uuid, bool) = sqlx::query_as(
        r#"
        INSERT INTO items (profile_id, sync_id, item_type, content, metadata, tags, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, now(), now())
        ON CONFLICT (profile_id, sync_id) DO UPDATE SET
            item_type = EXCLUDED.item_type,
            content = EXCLUDED.content,
            metadata = EXCLUDED.metadata,
            tags = EXCLUDED.tags,
            updated_at = now()
        RETURNING id, (xmax = 0) AS created
        "#,
    )
    .bind(profile_id)
    .bind(&item.sync_id)
    .bind(item.item_type.as_str())
    .bind(&item.content)
    .bind(&item.metadata)
    .bind(tags)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
