//! The Data Engine (DE, §4.3): enforces invariants over the Storage
//! Adapter — identifier allocation, tag normalization, item lifecycle, tag
//! frequency accounting, deduplication, and statistics. Has no knowledge of
//! the network; the Sync Engine is a caller of this module, not the other
//! way around.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::frecency;
use crate::id::new_id;
use crate::model::{Item, ItemFilter, ItemPatch, ItemType, Tag};
use crate::storage::StorageAdapter;
use crate::time::{Clock, SystemClock};

/// Arguments accepted by [`DataEngine::add_item`].
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub content: Option<String>,
    pub metadata: Option<String>,
    pub sync_id: Option<String>,
    pub sync_source: Option<String>,
}

/// Outcome of [`DataEngine::get_or_create_tag`].
#[derive(Debug, Clone)]
pub struct TagLookup {
    pub tag: Tag,
    pub created: bool,
}

/// Outcome of [`DataEngine::save_item`].
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub id: String,
    pub created: bool,
}

/// Outcome of [`DataEngine::deduplicate_items`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    pub removed_content: u64,
    pub removed_tagsets: u64,
}

/// Per-type item counts, always present regardless of whether a type has
/// zero items (§4.3 `getStats`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemTypeCounts {
    pub url: u64,
    pub text: u64,
    pub tagset: u64,
    pub image: u64,
}

/// Summary counters returned by [`DataEngine::get_stats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub total_items: u64,
    pub deleted_items: u64,
    pub total_tags: u64,
    pub items_by_type: ItemTypeCounts,
}

/// Business-rule layer over a [`StorageAdapter`]. Generic over the storage
/// backend so the same logic runs against [`crate::storage::MemoryStorage`]
/// and [`crate::storage::SqliteStorage`] unchanged.
pub struct DataEngine<S: StorageAdapter> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: StorageAdapter> DataEngine<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    pub async fn add_item(&self, item_type: ItemType, new_item: NewItem) -> Result<String> {
        let now = self.now();
        let id = new_id();
        let item = Item {
            id: id.clone(),
            item_type,
            content: new_item.content,
            metadata: new_item.metadata,
            sync_id: new_item.sync_id.unwrap_or_default(),
            sync_source: new_item.sync_source.unwrap_or_default(),
            synced_at: 0,
            created_at: now,
            updated_at: now,
            deleted_at: 0,
        };
        self.storage.insert_item(item).await?;
        Ok(id)
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.storage.get_item(id).await?)
    }

    pub async fn query_items(&self, filter: ItemFilter) -> Result<Vec<Item>> {
        Ok(self.storage.get_items(filter).await?)
    }

    pub async fn update_item(
        &self,
        id: &str,
        content: Option<String>,
        metadata: Option<String>,
    ) -> Result<()> {
        let patch = ItemPatch {
            content: content.map(Some),
            metadata: metadata.map(Some),
            updated_at: Some(self.now()),
            ..Default::default()
        };
        Ok(self.storage.update_item(id, patch).await?)
    }

    pub async fn delete_item(&self, id: &str) -> Result<()> {
        Ok(self.storage.delete_item(id, self.now()).await?)
    }

    /// Used only by [`Self::deduplicate_items`]; never called on the
    /// capture or sync hot path (§4.3).
    pub async fn hard_delete_item(&self, id: &str) -> Result<()> {
        Ok(self.storage.hard_delete_item(id).await?)
    }

    /// Normalize (trim), look up case-insensitively, and either bump
    /// frequency or create a new tag preserving the first-insertion casing.
    pub async fn get_or_create_tag(&self, name: &str) -> Result<TagLookup> {
        let trimmed = name.trim();
        let now = self.now();

        if let Some(mut tag) = self.storage.get_tag_by_name(trimmed).await? {
            tag.frequency += 1;
            tag.last_used_at = now;
            tag.frecency_score = frecency::score(tag.frequency, tag.last_used_at, now);
            tag.updated_at = now;
            self.storage.update_tag(tag.clone()).await?;
            return Ok(TagLookup { tag, created: false });
        }

        let tag = Tag {
            id: new_id(),
            name: trimmed.to_string(),
            frequency: 1,
            last_used_at: now,
            frecency_score: frecency::score(1, now, now),
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_tag(tag.clone()).await?;
        Ok(TagLookup { tag, created: true })
    }

    pub async fn tag_item(&self, item_id: &str, tag_id: &str) -> Result<()> {
        Ok(self.storage.tag_item(item_id, tag_id, self.now()).await?)
    }

    pub async fn untag_item(&self, item_id: &str, tag_id: &str) -> Result<()> {
        Ok(self.storage.untag_item(item_id, tag_id).await?)
    }

    pub async fn get_item_tags(&self, item_id: &str) -> Result<Vec<Tag>> {
        Ok(self.storage.get_item_tags(item_id).await?)
    }

    /// All tags ordered by `frecencyScore` descending.
    pub async fn get_tags_by_frecency(&self) -> Result<Vec<Tag>> {
        let mut tags = self.storage.get_all_tags().await?;
        tags.sort_by(|a, b| {
            b.frecency_score
                .partial_cmp(&a.frecency_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(tags)
    }

    /// The primary capture entry point (§4.3). Splits on whether `sync_id`
    /// is present: a non-empty `sync_id` takes the sync path (match-or-create
    /// by sync id, no content-based matching); an absent one always creates.
    pub async fn save_item(
        &self,
        item_type: ItemType,
        content: Option<String>,
        tag_names: &[String],
        metadata: Option<String>,
        sync_id: Option<String>,
    ) -> Result<SaveOutcome> {
        let now = self.now();

        let outcome = match sync_id.as_deref().filter(|s| !s.is_empty()) {
            Some(sid) => match self.storage.find_item_by_sync_id(sid).await? {
                Some(existing) => {
                    let patch = ItemPatch {
                        item_type: Some(item_type),
                        content: Some(content.clone()),
                        metadata: Some(metadata.clone()),
                        updated_at: Some(now),
                        ..Default::default()
                    };
                    self.storage.update_item(&existing.id, patch).await?;
                    self.storage.clear_item_tags(&existing.id).await?;
                    SaveOutcome {
                        id: existing.id,
                        created: false,
                    }
                }
                None => {
                    let id = new_id();
                    let item = Item {
                        id: id.clone(),
                        item_type,
                        content,
                        metadata,
                        sync_id: sid.to_string(),
                        sync_source: String::new(),
                        synced_at: 0,
                        created_at: now,
                        updated_at: now,
                        deleted_at: 0,
                    };
                    self.storage.insert_item(item).await?;
                    SaveOutcome { id, created: true }
                }
            },
            None => {
                let id = new_id();
                let item = Item {
                    id: id.clone(),
                    item_type,
                    content,
                    metadata,
                    sync_id: String::new(),
                    sync_source: String::new(),
                    synced_at: 0,
                    created_at: now,
                    updated_at: now,
                    deleted_at: 0,
                };
                self.storage.insert_item(item).await?;
                SaveOutcome { id, created: true }
            }
        };

        for name in tag_names {
            let lookup = self.get_or_create_tag(name).await?;
            self.tag_item(&outcome.id, &lookup.tag.id).await?;
        }

        Ok(outcome)
    }

    /// Batch garbage collector; never run on the hot path (§4.3).
    /// Idempotent: a second consecutive run removes nothing.
    pub async fn deduplicate_items(&self) -> Result<DedupOutcome> {
        let items = self.storage.get_all_live_items().await?;

        let mut content_groups: HashMap<(ItemType, String), Vec<Item>> = HashMap::new();
        let mut tagset_groups: HashMap<String, Vec<Item>> = HashMap::new();

        for item in items {
            if item.item_type == ItemType::Tagset {
                let mut links = self.storage.get_item_tag_links(&item.id).await?;
                links.sort_by(|a, b| a.tag_id.cmp(&b.tag_id));
                let mut names = Vec::with_capacity(links.len());
                for link in &links {
                    if let Some(tag) = self.storage.get_tag(&link.tag_id).await? {
                        names.push(tag.name);
                    }
                }
                names.sort();
                let key = names.join("\t");
                tagset_groups.entry(key).or_default().push(item);
            } else if let Some(content) = item.content.clone() {
                content_groups
                    .entry((item.item_type, content))
                    .or_default()
                    .push(item);
            }
        }

        let mut removed_content = 0u64;
        for (_, mut group) in content_groups {
            if group.len() < 2 {
                continue;
            }
            group.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            for loser in &group[1..] {
                self.storage.hard_delete_item(&loser.id).await?;
                removed_content += 1;
            }
        }

        let mut removed_tagsets = 0u64;
        for (_, mut group) in tagset_groups {
            if group.len() < 2 {
                continue;
            }
            group.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            for loser in &group[1..] {
                self.storage.hard_delete_item(&loser.id).await?;
                removed_tagsets += 1;
            }
        }

        Ok(DedupOutcome {
            removed_content,
            removed_tagsets,
        })
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.storage.get_setting(key).await?.map(|s| s.value))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        Ok(self.storage.set_setting(key, value).await?)
    }

    pub async fn get_stats(&self) -> Result<Stats> {
        let all_filter = ItemFilter {
            include_deleted: true,
            ..Default::default()
        };
        let all_items = self.storage.get_items(all_filter).await?;
        let tags = self.storage.get_all_tags().await?;

        let mut deleted_items = 0u64;
        let mut by_type = ItemTypeCounts::default();
        for item in &all_items {
            if !item.is_alive() {
                deleted_items += 1;
                continue;
            }
            match item.item_type {
                ItemType::Url => by_type.url += 1,
                ItemType::Text => by_type.text += 1,
                ItemType::Tagset => by_type.tagset += 1,
                ItemType::Image => by_type.image += 1,
            }
        }

        Ok(Stats {
            total_items: all_items.len() as u64,
            deleted_items,
            total_tags: tags.len() as u64,
            items_by_type: by_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn engine() -> DataEngine<MemoryStorage> {
        DataEngine::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn add_item_then_get_item() {
        let de = engine();
        let id = de
            .add_item(ItemType::Text, NewItem {
                content: Some("hello".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let item = de.get_item(&id).await.unwrap().unwrap();
        assert_eq!(item.content.as_deref(), Some("hello"));
        assert_eq!(item.deleted_at, 0);
    }

    #[tokio::test]
    async fn deleted_item_is_not_returned_by_get_item() {
        let de = engine();
        let id = de.add_item(ItemType::Text, NewItem::default()).await.unwrap();
        de.delete_item(&id).await.unwrap();
        assert!(de.get_item(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_or_create_tag_increments_frequency_and_keeps_first_casing() {
        let de = engine();
        let first = de.get_or_create_tag("Rust").await.unwrap();
        assert!(first.created);
        assert_eq!(first.tag.frequency, 1);

        let second = de.get_or_create_tag("rust").await.unwrap();
        assert!(!second.created);
        assert_eq!(second.tag.frequency, 2);
        assert_eq!(second.tag.name, "Rust");
        assert_eq!(second.tag.id, first.tag.id);
    }

    #[tokio::test]
    async fn get_or_create_tag_trims_whitespace() {
        let de = engine();
        let tag = de.get_or_create_tag("  spacey  ").await.unwrap();
        assert_eq!(tag.tag.name, "spacey");
    }

    #[tokio::test]
    async fn save_item_non_sync_path_always_creates() {
        let de = engine();
        let names = vec!["a".to_string()];
        let first = de
            .save_item(ItemType::Text, Some("x".into()), &names, None, None)
            .await
            .unwrap();
        let second = de
            .save_item(ItemType::Text, Some("x".into()), &names, None, None)
            .await
            .unwrap();
        assert!(first.created);
        assert!(second.created);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn save_item_sync_path_updates_existing_and_retags() {
        let de = engine();
        let tags_v1 = vec!["old".to_string()];
        let first = de
            .save_item(
                ItemType::Text,
                Some("v1".into()),
                &tags_v1,
                None,
                Some("sync-1".into()),
            )
            .await
            .unwrap();
        assert!(first.created);

        let tags_v2 = vec!["new".to_string()];
        let second = de
            .save_item(
                ItemType::Text,
                Some("v2".into()),
                &tags_v2,
                None,
                Some("sync-1".into()),
            )
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.id, first.id);

        let item = de.get_item(&first.id).await.unwrap().unwrap();
        assert_eq!(item.content.as_deref(), Some("v2"));

        let tags = de.get_item_tags(&first.id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "new");
    }

    #[tokio::test]
    async fn dedup_content_group_keeps_earliest_and_is_idempotent() {
        let de = engine();
        let names: Vec<String> = vec![];
        let first = de
            .save_item(ItemType::Url, Some("https://a.test".into()), &names, None, None)
            .await
            .unwrap();
        // second save_item with no sync_id always creates a new row, hence the duplicate.
        let _second = de
            .save_item(ItemType::Url, Some("https://a.test".into()), &names, None, None)
            .await
            .unwrap();

        let outcome = de.deduplicate_items().await.unwrap();
        assert_eq!(outcome.removed_content, 1);
        assert!(de.get_item(&first.id).await.unwrap().is_some());

        let second_run = de.deduplicate_items().await.unwrap();
        assert_eq!(second_run, DedupOutcome::default());
    }

    #[tokio::test]
    async fn dedup_tagset_group_keys_on_sorted_tag_names() {
        let de = engine();
        let tags = vec!["b".to_string(), "a".to_string()];
        let first = de
            .save_item(ItemType::Tagset, None, &tags, None, None)
            .await
            .unwrap();
        let tags_reordered = vec!["a".to_string(), "b".to_string()];
        let _second = de
            .save_item(ItemType::Tagset, None, &tags_reordered, None, None)
            .await
            .unwrap();

        let outcome = de.deduplicate_items().await.unwrap();
        assert_eq!(outcome.removed_tagsets, 1);
        assert!(de.get_item(&first.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stats_counts_all_item_types() {
        let de = engine();
        de.add_item(ItemType::Url, NewItem::default()).await.unwrap();
        de.add_item(ItemType::Text, NewItem::default()).await.unwrap();
        let deleted_id = de.add_item(ItemType::Image, NewItem::default()).await.unwrap();
        de.delete_item(&deleted_id).await.unwrap();

        let stats = de.get_stats().await.unwrap();
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.deleted_items, 1);
        assert_eq!(stats.items_by_type.url, 1);
        assert_eq!(stats.items_by_type.text, 1);
        assert_eq!(stats.items_by_type.image, 0);
        assert_eq!(stats.items_by_type.tagset, 0);
    }
}
