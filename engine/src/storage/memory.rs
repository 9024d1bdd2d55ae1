//! In-memory [`StorageAdapter`] implementation: the ephemeral backend used
//! by tests and short-lived hosts. A `HashMap`-keyed record store scoped to
//! items/tags/links/settings.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{Item, ItemFilter, ItemPatch, ItemTag, Setting, Tag};

use super::{StorageAdapter, StorageResult};

#[derive(Default)]
struct Inner {
    items: HashMap<String, Item>,
    tags: HashMap<String, Tag>,
    links: Vec<ItemTag>,
    settings: HashMap<String, String>,
}

/// A `HashMap`-backed [`StorageAdapter`] with no external resources.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get_item(&self, id: &str) -> StorageResult<Option<Item>> {
        let guard = self.lock();
        Ok(guard.items.get(id).filter(|i| i.is_alive()).cloned())
    }

    async fn get_items(&self, filter: ItemFilter) -> StorageResult<Vec<Item>> {
        let guard = self.lock();
        let mut items: Vec<Item> = guard
            .items
            .values()
            .filter(|i| filter.include_deleted || i.is_alive())
            .filter(|i| filter.item_type.map_or(true, |t| i.item_type == t))
            .filter(|i| filter.since.map_or(true, |since| i.updated_at > since))
            .cloned()
            .collect();

        if filter.since.is_some() {
            items.sort_by_key(|i| i.updated_at);
        } else {
            items.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        }
        Ok(items)
    }

    async fn insert_item(&self, item: Item) -> StorageResult<()> {
        let mut guard = self.lock();
        guard.items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn update_item(&self, id: &str, patch: ItemPatch) -> StorageResult<()> {
        let mut guard = self.lock();
        let item = guard
            .items
            .get_mut(id)
            .ok_or_else(|| StorageError::ItemNotFound(id.to_string()))?;

        if let Some(t) = patch.item_type {
            item.item_type = t;
        }
        if let Some(content) = patch.content {
            item.content = content;
        }
        if let Some(metadata) = patch.metadata {
            item.metadata = metadata;
        }
        if let Some(sync_id) = patch.sync_id {
            item.sync_id = sync_id;
        }
        if let Some(sync_source) = patch.sync_source {
            item.sync_source = sync_source;
        }
        if let Some(synced_at) = patch.synced_at {
            item.synced_at = synced_at;
        }
        if let Some(updated_at) = patch.updated_at {
            item.updated_at = updated_at;
        }
        if let Some(deleted_at) = patch.deleted_at {
            item.deleted_at = deleted_at;
        }
        Ok(())
    }

    async fn delete_item(&self, id: &str, now: i64) -> StorageResult<()> {
        let mut guard = self.lock();
        let item = guard
            .items
            .get_mut(id)
            .ok_or_else(|| StorageError::ItemNotFound(id.to_string()))?;
        if item.is_alive() {
            item.deleted_at = now;
            item.updated_at = now;
        }
        Ok(())
    }

    async fn hard_delete_item(&self, id: &str) -> StorageResult<()> {
        let mut guard = self.lock();
        guard.items.remove(id);
        guard.links.retain(|l| l.item_id != id);
        Ok(())
    }

    async fn get_tag(&self, id: &str) -> StorageResult<Option<Tag>> {
        Ok(self.lock().tags.get(id).cloned())
    }

    async fn get_tag_by_name(&self, name: &str) -> StorageResult<Option<Tag>> {
        let guard = self.lock();
        Ok(guard
            .tags
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn insert_tag(&self, tag: Tag) -> StorageResult<()> {
        self.lock().tags.insert(tag.id.clone(), tag);
        Ok(())
    }

    async fn update_tag(&self, tag: Tag) -> StorageResult<()> {
        let mut guard = self.lock();
        if !guard.tags.contains_key(&tag.id) {
            return Err(StorageError::TagNotFound(tag.id));
        }
        guard.tags.insert(tag.id.clone(), tag);
        Ok(())
    }

    async fn get_all_tags(&self) -> StorageResult<Vec<Tag>> {
        Ok(self.lock().tags.values().cloned().collect())
    }

    async fn get_item_tags(&self, item_id: &str) -> StorageResult<Vec<Tag>> {
        let guard = self.lock();
        let tag_ids: Vec<&str> = guard
            .links
            .iter()
            .filter(|l| l.item_id == item_id)
            .map(|l| l.tag_id.as_str())
            .collect();
        Ok(tag_ids
            .into_iter()
            .filter_map(|id| guard.tags.get(id).cloned())
            .collect())
    }

    async fn get_items_by_tag(&self, tag_id: &str) -> StorageResult<Vec<Item>> {
        let guard = self.lock();
        let item_ids: Vec<&str> = guard
            .links
            .iter()
            .filter(|l| l.tag_id == tag_id)
            .map(|l| l.item_id.as_str())
            .collect();
        Ok(item_ids
            .into_iter()
            .filter_map(|id| guard.items.get(id))
            .filter(|i| i.is_alive())
            .cloned()
            .collect())
    }

    async fn tag_item(&self, item_id: &str, tag_id: &str, now: i64) -> StorageResult<()> {
        let mut guard = self.lock();
        let exists = guard
            .links
            .iter()
            .any(|l| l.item_id == item_id && l.tag_id == tag_id);
        if !exists {
            guard.links.push(ItemTag {
                item_id: item_id.to_string(),
                tag_id: tag_id.to_string(),
                created_at: now,
            });
        }
        Ok(())
    }

    async fn untag_item(&self, item_id: &str, tag_id: &str) -> StorageResult<()> {
        let mut guard = self.lock();
        guard
            .links
            .retain(|l| !(l.item_id == item_id && l.tag_id == tag_id));
        Ok(())
    }

    async fn clear_item_tags(&self, item_id: &str) -> StorageResult<()> {
        let mut guard = self.lock();
        guard.links.retain(|l| l.item_id != item_id);
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> StorageResult<Option<Setting>> {
        let guard = self.lock();
        Ok(guard.settings.get(key).map(|value| Setting {
            key: key.to_string(),
            value: value.clone(),
        }))
    }

    async fn set_setting(&self, key: &str, value: &str) -> StorageResult<()> {
        self.lock()
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn find_item_by_sync_id(&self, sync_id_or_local_id: &str) -> StorageResult<Option<Item>> {
        let guard = self.lock();
        if let Some(item) = guard.items.get(sync_id_or_local_id).filter(|i| i.is_alive()) {
            return Ok(Some(item.clone()));
        }
        Ok(guard
            .items
            .values()
            .find(|i| i.is_alive() && i.sync_id == sync_id_or_local_id)
            .cloned())
    }

    async fn get_item_tag_links(&self, item_id: &str) -> StorageResult<Vec<ItemTag>> {
        let guard = self.lock();
        Ok(guard
            .links
            .iter()
            .filter(|l| l.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn get_all_live_items(&self) -> StorageResult<Vec<Item>> {
        let guard = self.lock();
        Ok(guard.items.values().filter(|i| i.is_alive()).cloned().collect())
    }
}
