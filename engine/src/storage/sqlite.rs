//! Embedded-SQL-engine [`StorageAdapter`] implementation over `rusqlite`.
//!
//! Grounded in the prior Rust port of this exact system's Tauri backend,
//! which also wraps a `rusqlite::Connection` in an `Arc<Mutex<_>>` because
//! `Connection` is `!Sync`. `open`/`close` follow the scoped-handle design
//! note (§9): `close` is explicit and idempotent, and an unclosed handle
//! still releases the connection when the last `Arc` drops.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StorageError;
use crate::model::{Item, ItemFilter, ItemPatch, ItemTag, ItemType, Setting, Tag};

use super::{StorageAdapter, StorageResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    content TEXT,
    metadata TEXT,
    sync_id TEXT NOT NULL DEFAULT '',
    sync_source TEXT NOT NULL DEFAULT '',
    synced_at INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    deleted_at INTEGER NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_items_sync_id ON items(sync_id) WHERE sync_id != '';
CREATE INDEX IF NOT EXISTS idx_items_updated_at ON items(updated_at);
CREATE INDEX IF NOT EXISTS idx_items_created_at ON items(created_at);

CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    last_used_at INTEGER NOT NULL,
    frecency_score REAL NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_name_lower ON tags(LOWER(name));

CREATE TABLE IF NOT EXISTS item_tags (
    item_id TEXT NOT NULL,
    tag_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (item_id, tag_id)
);
CREATE INDEX IF NOT EXISTS idx_item_tags_tag_id ON item_tags(tag_id);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// A durable [`StorageAdapter`] backed by a single embedded SQLite database.
///
/// Only one `SqliteStorage` per database file is permitted; the host
/// guarantees exclusivity (§5).
pub struct SqliteStorage {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStorage {
    /// Open (creating if absent) the database at `path` and apply schema.
    pub fn open(path: &str) -> StorageResult<Self> {
        let conn = Connection::open(path).map_err(|e| StorageError::Backend(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Open an in-memory database, primarily for tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Backend(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Release the underlying connection. Idempotent; safe to call more than once.
    pub fn close(&self) -> StorageResult<()> {
        let mut guard = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        guard.take();
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> StorageResult<T> {
        let guard = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let conn = guard
            .as_ref()
            .ok_or_else(|| StorageError::Backend("storage adapter is closed".to_string()))?;
        f(conn).map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
        let type_str: String = row.get("type")?;
        Ok(Item {
            id: row.get("id")?,
            item_type: type_str.parse().unwrap_or(ItemType::Text),
            content: row.get("content")?,
            metadata: row.get("metadata")?,
            sync_id: row.get("sync_id")?,
            sync_source: row.get("sync_source")?,
            synced_at: row.get("synced_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            deleted_at: row.get("deleted_at")?,
        })
    }

    fn row_to_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
        Ok(Tag {
            id: row.get("id")?,
            name: row.get("name")?,
            frequency: row.get("frequency")?,
            last_used_at: row.get("last_used_at")?,
            frecency_score: row.get("frecency_score")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl Drop for SqliteStorage {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.conn.lock() {
            guard.take();
        }
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn get_item(&self, id: &str) -> StorageResult<Option<Item>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM items WHERE id = ?1 AND deleted_at = 0",
                params![id],
                Self::row_to_item,
            )
            .optional()
        })
    }

    async fn get_items(&self, filter: ItemFilter) -> StorageResult<Vec<Item>> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM items WHERE 1=1");
            if !filter.include_deleted {
                sql.push_str(" AND deleted_at = 0");
            }
            if let Some(t) = filter.item_type {
                sql.push_str(&format!(" AND type = '{}'", t.as_str()));
            }
            if let Some(since) = filter.since {
                sql.push_str(&format!(" AND updated_at > {since}"));
                sql.push_str(" ORDER BY updated_at ASC");
            } else {
                sql.push_str(" ORDER BY created_at DESC");
            }
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], Self::row_to_item)?;
            rows.collect()
        })
    }

    async fn insert_item(&self, item: Item) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO items (id, type, content, metadata, sync_id, sync_source, synced_at, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    item.id,
                    item.item_type.as_str(),
                    item.content,
                    item.metadata,
                    item.sync_id,
                    item.sync_source,
                    item.synced_at,
                    item.created_at,
                    item.updated_at,
                    item.deleted_at,
                ],
            )?;
            Ok(())
        })
    }

    async fn update_item(&self, id: &str, patch: ItemPatch) -> StorageResult<()> {
        self.with_conn(|conn| {
            let existing = conn.query_row(
                "SELECT * FROM items WHERE id = ?1",
                params![id],
                Self::row_to_item,
            )?;

            let item_type = patch.item_type.unwrap_or(existing.item_type);
            let content = patch.content.unwrap_or(existing.content);
            let metadata = patch.metadata.unwrap_or(existing.metadata);
            let sync_id = patch.sync_id.unwrap_or(existing.sync_id);
            let sync_source = patch.sync_source.unwrap_or(existing.sync_source);
            let synced_at = patch.synced_at.unwrap_or(existing.synced_at);
            let updated_at = patch.updated_at.unwrap_or(existing.updated_at);
            let deleted_at = patch.deleted_at.unwrap_or(existing.deleted_at);

            conn.execute(
                "UPDATE items SET type=?2, content=?3, metadata=?4, sync_id=?5, sync_source=?6,
                 synced_at=?7, updated_at=?8, deleted_at=?9 WHERE id=?1",
                params![
                    id,
                    item_type.as_str(),
                    content,
                    metadata,
                    sync_id,
                    sync_source,
                    synced_at,
                    updated_at,
                    deleted_at,
                ],
            )?;
            Ok(())
        })
    }

    async fn delete_item(&self, id: &str, now: i64) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE items SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at = 0",
                params![id, now],
            )?;
            Ok(())
        })
    }

    async fn hard_delete_item(&self, id: &str) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM item_tags WHERE item_id = ?1", params![id])?;
            conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    async fn get_tag(&self, id: &str) -> StorageResult<Option<Tag>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM tags WHERE id = ?1", params![id], Self::row_to_tag)
                .optional()
        })
    }

    async fn get_tag_by_name(&self, name: &str) -> StorageResult<Option<Tag>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM tags WHERE LOWER(name) = LOWER(?1)",
                params![name],
                Self::row_to_tag,
            )
            .optional()
        })
    }

    async fn insert_tag(&self, tag: Tag) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tags (id, name, frequency, last_used_at, frecency_score, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    tag.id,
                    tag.name,
                    tag.frequency,
                    tag.last_used_at,
                    tag.frecency_score,
                    tag.created_at,
                    tag.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    async fn update_tag(&self, tag: Tag) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE tags SET name=?2, frequency=?3, last_used_at=?4, frecency_score=?5, updated_at=?6
                 WHERE id=?1",
                params![
                    tag.id,
                    tag.name,
                    tag.frequency,
                    tag.last_used_at,
                    tag.frecency_score,
                    tag.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    async fn get_all_tags(&self) -> StorageResult<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tags")?;
            let rows = stmt.query_map([], Self::row_to_tag)?;
            rows.collect()
        })
    }

    async fn get_item_tags(&self, item_id: &str) -> StorageResult<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.* FROM tags t JOIN item_tags it ON it.tag_id = t.id WHERE it.item_id = ?1",
            )?;
            let rows = stmt.query_map(params![item_id], Self::row_to_tag)?;
            rows.collect()
        })
    }

    async fn get_items_by_tag(&self, tag_id: &str) -> StorageResult<Vec<Item>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.* FROM items i JOIN item_tags it ON it.item_id = i.id
                 WHERE it.tag_id = ?1 AND i.deleted_at = 0",
            )?;
            let rows = stmt.query_map(params![tag_id], Self::row_to_item)?;
            rows.collect()
        })
    }

    async fn tag_item(&self, item_id: &str, tag_id: &str, now: i64) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO item_tags (item_id, tag_id, created_at) VALUES (?1, ?2, ?3)",
                params![item_id, tag_id, now],
            )?;
            Ok(())
        })
    }

    async fn untag_item(&self, item_id: &str, tag_id: &str) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM item_tags WHERE item_id = ?1 AND tag_id = ?2",
                params![item_id, tag_id],
            )?;
            Ok(())
        })
    }

    async fn clear_item_tags(&self, item_id: &str) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM item_tags WHERE item_id = ?1", params![item_id])?;
            Ok(())
        })
    }

    async fn get_setting(&self, key: &str) -> StorageResult<Option<Setting>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT key, value FROM settings WHERE key = ?1",
                params![key],
                |row| {
                    Ok(Setting {
                        key: row.get(0)?,
                        value: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    async fn set_setting(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
    }

    async fn find_item_by_sync_id(&self, sync_id_or_local_id: &str) -> StorageResult<Option<Item>> {
        if let Some(item) = self.get_item(sync_id_or_local_id).await? {
            return Ok(Some(item));
        }
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM items WHERE sync_id = ?1 AND deleted_at = 0",
                params![sync_id_or_local_id],
                Self::row_to_item,
            )
            .optional()
        })
    }

    async fn get_item_tag_links(&self, item_id: &str) -> StorageResult<Vec<ItemTag>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT item_id, tag_id, created_at FROM item_tags WHERE item_id = ?1")?;
            let rows = stmt.query_map(params![item_id], |row| {
                Ok(ItemTag {
                    item_id: row.get(0)?,
                    tag_id: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;
            rows.collect()
        })
    }

    async fn get_all_live_items(&self) -> StorageResult<Vec<Item>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM items WHERE deleted_at = 0")?;
            let rows = stmt.query_map([], Self::row_to_item)?;
            rows.collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemType;

    fn item(id: &str, created_at: i64) -> Item {
        Item {
            id: id.to_string(),
            item_type: ItemType::Text,
            content: Some("hi".into()),
            metadata: None,
            sync_id: String::new(),
            sync_source: String::new(),
            synced_at: 0,
            created_at,
            updated_at: created_at,
            deleted_at: 0,
        }
    }

    #[tokio::test]
    async fn open_creates_schema_and_roundtrips_item() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.insert_item(item("i1", 100)).await.unwrap();
        let got = storage.get_item("i1").await.unwrap().unwrap();
        assert_eq!(got.content.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn sync_id_unique_index_allows_repeated_empty_string() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.insert_item(item("i1", 100)).await.unwrap();
        storage.insert_item(item("i2", 200)).await.unwrap();
        // both have sync_id == "" which the partial unique index excludes.
        assert!(storage.get_item("i1").await.unwrap().is_some());
        assert!(storage.get_item("i2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn close_then_operate_fails_cleanly() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.close().unwrap();
        let err = storage.get_item("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }

    #[tokio::test]
    async fn find_item_by_sync_id_prefers_primary_id() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let mut i = item("local-1", 100);
        i.sync_id = "local-1-as-sync-id-of-other".to_string();
        storage.insert_item(i).await.unwrap();

        let found = storage.find_item_by_sync_id("local-1").await.unwrap().unwrap();
        assert_eq!(found.id, "local-1");
    }
}
