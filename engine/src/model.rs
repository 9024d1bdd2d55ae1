//! Core entity types: [`Item`], [`Tag`], [`ItemTag`], [`Setting`].
//!
//! These mirror the shapes the storage adapter persists and the wire
//! protocol exchanges (§3, §6.1). Timestamps are milliseconds since the
//! Unix epoch; `metadata` is carried as opaque JSON text and only parsed
//! at the edges that need a specific key.

use serde::{Deserialize, Serialize};

/// The closed set of item kinds. A tagset never carries `content`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Url,
    Text,
    Tagset,
    Image,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Url => "url",
            ItemType::Text => "text",
            ItemType::Tagset => "tagset",
            ItemType::Image => "image",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(ItemType::Url),
            "text" => Ok(ItemType::Text),
            "tagset" => Ok(ItemType::Tagset),
            "image" => Ok(ItemType::Image),
            other => Err(format!("unknown item type: {other}")),
        }
    }
}

/// A captured unit: URL, text snippet, tagset, or image reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub content: Option<String>,
    /// Opaque JSON text; the engine never assumes structure here.
    pub metadata: Option<String>,
    /// Empty until bound by a successful push or a pull match.
    pub sync_id: String,
    /// Empty, or "server" once the item originated from or was pushed to a server.
    pub sync_source: String,
    /// 0 if never synced.
    pub synced_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    /// 0 means alive (a tombstone sets this to the deletion wall-clock time).
    pub deleted_at: i64,
}

impl Item {
    pub fn is_alive(&self) -> bool {
        self.deleted_at == 0
    }

    pub fn is_synced(&self) -> bool {
        self.sync_source == "server"
    }
}

/// A normalized tag with a frecency ranking score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    /// Case-preserving; lookups are case-insensitive.
    pub name: String,
    pub frequency: u32,
    pub last_used_at: i64,
    pub frecency_score: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Association row linking an item to a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTag {
    pub item_id: String,
    pub tag_id: String,
    pub created_at: i64,
}

/// A single opaque key/value setting row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Filter options for [`crate::storage::StorageAdapter::get_items`].
///
/// Order: `createdAt` descending unless `since` is set, in which case
/// `updatedAt` ascending (§4.1).
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub item_type: Option<ItemType>,
    pub since: Option<i64>,
    pub include_deleted: bool,
}

/// Partial update applied to an existing item; only `Some` fields change.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub item_type: Option<ItemType>,
    pub content: Option<Option<String>>,
    pub metadata: Option<Option<String>>,
    pub sync_id: Option<String>,
    pub sync_source: Option<String>,
    pub synced_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub deleted_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_roundtrips_through_str() {
        for t in [ItemType::Url, ItemType::Text, ItemType::Tagset, ItemType::Image] {
            let s = t.to_string();
            let parsed: ItemType = s.parse().unwrap();
            assert_eq!(t, parsed);
        }
    }

    #[test]
    fn item_type_rejects_unknown() {
        assert!("note".parse::<ItemType>().is_err());
    }

    #[test]
    fn item_serialization_is_camel_case() {
        let item = Item {
            id: "i1".into(),
            item_type: ItemType::Url,
            content: Some("https://a.test".into()),
            metadata: None,
            sync_id: String::new(),
            sync_source: String::new(),
            synced_at: 0,
            created_at: 1,
            updated_at: 1,
            deleted_at: 0,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"syncId\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"type\":\"url\""));
    }

    #[test]
    fn alive_and_synced_predicates() {
        let mut item = Item {
            id: "i1".into(),
            item_type: ItemType::Text,
            content: Some("hi".into()),
            metadata: None,
            sync_id: String::new(),
            sync_source: String::new(),
            synced_at: 0,
            created_at: 1,
            updated_at: 1,
            deleted_at: 0,
        };
        assert!(item.is_alive());
        assert!(!item.is_synced());

        item.deleted_at = 5;
        item.sync_source = "server".into();
        assert!(!item.is_alive());
        assert!(item.is_synced());
    }
}
