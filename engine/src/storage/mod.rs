//! The Storage Adapter (SA, §4.1): a narrow async interface over item, tag,
//! link, and setting rows. No business rules live here — normalization,
//! dedup, frecency, and sync state belong to the Data Engine and Sync
//! Engine layers above.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{Item, ItemFilter, ItemPatch, ItemTag, Setting, Tag};

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Pluggable persistence backend for items, tags, links, and settings.
///
/// Implementations MUST provide soft-delete semantics (`get_item` and
/// `get_items` without `include_deleted` exclude tombstones), case
/// insensitive tag name lookup, and idempotent `tag_item`.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn get_item(&self, id: &str) -> StorageResult<Option<Item>>;
    async fn get_items(&self, filter: ItemFilter) -> StorageResult<Vec<Item>>;
    async fn insert_item(&self, item: Item) -> StorageResult<()>;
    async fn update_item(&self, id: &str, patch: ItemPatch) -> StorageResult<()>;
    /// Soft delete: sets `deletedAt`/`updatedAt` to `now` if currently alive; no-op otherwise.
    async fn delete_item(&self, id: &str, now: i64) -> StorageResult<()>;
    /// Removes the row and cascades all [`ItemTag`] links referencing it.
    async fn hard_delete_item(&self, id: &str) -> StorageResult<()>;

    async fn get_tag(&self, id: &str) -> StorageResult<Option<Tag>>;
    /// Case-insensitive lookup by name.
    async fn get_tag_by_name(&self, name: &str) -> StorageResult<Option<Tag>>;
    async fn insert_tag(&self, tag: Tag) -> StorageResult<()>;
    async fn update_tag(&self, tag: Tag) -> StorageResult<()>;
    async fn get_all_tags(&self) -> StorageResult<Vec<Tag>>;

    async fn get_item_tags(&self, item_id: &str) -> StorageResult<Vec<Tag>>;
    /// Excludes deleted items.
    async fn get_items_by_tag(&self, tag_id: &str) -> StorageResult<Vec<Item>>;
    /// Idempotent on the `(item_id, tag_id)` pair.
    async fn tag_item(&self, item_id: &str, tag_id: &str, now: i64) -> StorageResult<()>;
    async fn untag_item(&self, item_id: &str, tag_id: &str) -> StorageResult<()>;
    async fn clear_item_tags(&self, item_id: &str) -> StorageResult<()>;

    async fn get_setting(&self, key: &str) -> StorageResult<Option<Setting>>;
    async fn set_setting(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Returns a live item whose `id` OR `syncId` equals `sync_id_or_local_id`,
    /// checked in that fixed order (§9 design note).
    async fn find_item_by_sync_id(&self, sync_id_or_local_id: &str) -> StorageResult<Option<Item>>;

    /// Raw item-tag link rows, exposed for the dedup tagset grouping key.
    async fn get_item_tag_links(&self, item_id: &str) -> StorageResult<Vec<ItemTag>>;

    /// All live items across all types, used by dedup and stats.
    async fn get_all_live_items(&self) -> StorageResult<Vec<Item>>;
}
