//! Handlers backing the wire protocol's three item endpoints (spec §6.1).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pocket_engine::sync::wire::{ClientItem, PullResponse, PushResponse, ServerItem};

use crate::auth::middleware::AuthUser;
use crate::db;
use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub profile: Option<String>,
}

fn profile_of(query: &ProfileQuery) -> String {
    query.profile.clone().unwrap_or_default()
}

fn to_server_item(stored: db::StoredItem) -> ServerItem {
    ServerItem {
        id: stored.id.to_string(),
        item_type: stored.item_type.parse().unwrap_or(pocket_engine::model::ItemType::Text),
        content: stored.content,
        metadata: stored.metadata,
        tags: stored.tags,
        created_at: stored.created_at.to_rfc3339(),
        updated_at: stored.updated_at.to_rfc3339(),
    }
}

/// `GET /items[?profile=P]` — all live items for the profile.
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
    _user: AuthUser,
) -> Result<Json<PullResponse>> {
    let profile = profile_of(&query);
    let items = db::get_items(&state.pool, &profile)
        .await?
        .into_iter()
        .map(to_server_item)
        .collect();
    Ok(Json(PullResponse { items }))
}

/// `GET /items/since/{isoTimestamp}[?profile=P]` — items updated after the
/// given timestamp.
pub async fn list_items_since(
    State(state): State<AppState>,
    Path(since): Path<String>,
    Query(query): Query<ProfileQuery>,
    _user: AuthUser,
) -> Result<Json<PullResponse>> {
    let since: DateTime<Utc> = since
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid timestamp: {since}")))?;
    let profile = profile_of(&query);
    let items = db::get_items_since(&state.pool, &profile, since)
        .await?
        .into_iter()
        .map(to_server_item)
        .collect();
    Ok(Json(PullResponse { items }))
}

#[derive(Debug, Serialize)]
pub struct CreateItemResponse {
    pub id: String,
    pub created: bool,
}

/// `POST /items[?profile=P]` — upsert by `sync_id` within the profile
/// (§6.1 dedup contract: the server matches incoming `sync_id` exclusively).
pub async fn create_item(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
    _user: AuthUser,
    Json(item): Json<ClientItem>,
) -> Result<Json<PushResponse>> {
    if item.sync_id.is_empty() {
        return Err(AppError::BadRequest("sync_id must not be empty".to_string()));
    }
    let profile = profile_of(&query);
    let (id, created) = db::upsert_item(&state.pool, &profile, &item).await?;
    Ok(Json(PushResponse {
        id: id.to_string(),
        created,
    }))
}
