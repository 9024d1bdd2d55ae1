//! Wire-protocol body shapes (§6.1), exchanged verbatim with the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ItemType;

/// An item as the server represents it on the wire. Serialize is used by
/// the server to build pull responses; Deserialize by the client (Sync
/// Engine) to read them — both sides share this one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub content: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// An item as pushed to the server. Serialize is used by the client; the
/// server deserializes the same shape out of the POST body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientItem {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Option<serde_json::Value>,
    pub sync_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullResponse {
    pub items: Vec<ServerItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushResponse {
    pub id: String,
    pub created: bool,
}

/// Render a millisecond epoch timestamp as RFC3339, the form `/items/since/`
/// expects in its path (§6.1).
pub fn to_iso(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp_millis(0).unwrap())
        .to_rfc3339()
}

/// Parse a server-supplied RFC3339/ISO8601 timestamp into epoch milliseconds.
pub fn parse_iso_to_ms(s: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| Error::Transport(format!("invalid timestamp {s:?}: {e}")))
}
