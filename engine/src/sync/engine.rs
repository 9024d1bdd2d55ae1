//! The Sync Engine (SE, §4.4): speaks the wire protocol with the HTTP
//! server, drives the Data Engine to pull/push/merge, persists sync
//! cursors, and detects server identity changes.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::data_engine::DataEngine;
use crate::error::{Error, Result};
use crate::id::new_id;
use crate::model::ItemPatch;
use crate::storage::StorageAdapter;
use crate::sync::config::{ConfigProvider, SyncConfigPatch};
use crate::time::Clock;
use crate::sync::transport::{SyncTransport, WireRequest};
use crate::sync::wire::{parse_iso_to_ms, to_iso, ClientItem, PullResponse, PushResponse, ServerItem};
use crate::version::{check_versions, ObservedVersions};

/// Result of [`SyncEngine::pull_from_server`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullResult {
    pub pulled: u64,
    pub conflicts: u64,
}

/// Result of [`SyncEngine::push_to_server`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushResult {
    pub pushed: u64,
    pub failed: u64,
}

/// Result of [`SyncEngine::sync_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncAllResult {
    pub pulled: u64,
    pub pushed: u64,
    pub conflicts: u64,
    pub failed: u64,
    pub last_sync_time: i64,
}

/// Result of [`SyncEngine::get_sync_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub configured: bool,
    pub last_sync_time: i64,
    pub pending_count: u64,
}

/// Arguments to [`SyncEngine::pull_from_server`]; `since` overrides the
/// stored cursor when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullArgs {
    pub since: Option<i64>,
}

enum MergeOutcome {
    Pulled,
    Conflict,
    NoOp,
}

const SETTING_LAST_SYNC_SERVER_URL: &str = "sync_lastSyncServerUrl";
const SETTING_LAST_SYNC_PROFILE_ID: &str = "sync_lastSyncProfileId";

/// Drives bidirectional synchronization for one [`DataEngine`] instance.
pub struct SyncEngine<S: StorageAdapter> {
    data_engine: Arc<DataEngine<S>>,
    transport: Arc<dyn SyncTransport>,
    config: Arc<dyn ConfigProvider>,
}

impl<S: StorageAdapter> SyncEngine<S> {
    pub fn new(
        data_engine: Arc<DataEngine<S>>,
        transport: Arc<dyn SyncTransport>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            data_engine,
            transport,
            config,
        }
    }

    fn now(&self) -> i64 {
        self.data_engine.clock().now_ms()
    }

    /// §4.4.1.
    pub async fn pull_from_server(&self, args: PullArgs) -> Result<PullResult> {
        let config = self.config.read().await?;
        if config.server_url.is_empty() || config.api_key.is_empty() {
            return Ok(PullResult::default());
        }

        let since = args.since.unwrap_or(config.last_sync_time);
        let path = if since > 0 {
            format!("/items/since/{}", to_iso(since))
        } else {
            "/items".to_string()
        };

        let req = WireRequest::get(path, config.api_key.clone())
            .with_profile(config.server_profile_id.as_deref());
        let resp = self
            .transport
            .request(req)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        check_versions(ObservedVersions {
            datastore: resp.datastore_version,
            protocol: resp.protocol_version,
        })?;

        if resp.is_error() {
            return Err(Error::ServerError {
                status: resp.status,
                body: resp.body,
            });
        }

        let parsed: PullResponse = serde_json::from_str(&resp.body)
            .map_err(|e| Error::Transport(format!("malformed pull response: {e}")))?;

        let mut pulled = 0u64;
        let mut conflicts = 0u64;
        for item in parsed.items {
            match self.merge_server_item(item).await? {
                MergeOutcome::Pulled => pulled += 1,
                MergeOutcome::Conflict => conflicts += 1,
                MergeOutcome::NoOp => {}
            }
        }

        debug!(pulled, conflicts, "pull complete");
        Ok(PullResult { pulled, conflicts })
    }

    async fn merge_server_item(&self, server: ServerItem) -> Result<MergeOutcome> {
        let storage = self.data_engine.storage();
        let server_updated = parse_iso_to_ms(&server.updated_at)?;
        let now = self.now();

        match storage.find_item_by_sync_id(&server.id).await? {
            None => {
                let created_at = parse_iso_to_ms(&server.created_at)?;
                let id = new_id();
                let metadata = server.metadata.as_ref().map(|v| v.to_string());
                let item = crate::model::Item {
                    id: id.clone(),
                    item_type: server.item_type,
                    content: server.content.clone(),
                    metadata,
                    sync_id: server.id.clone(),
                    sync_source: "server".to_string(),
                    synced_at: now,
                    created_at,
                    updated_at: server_updated,
                    deleted_at: 0,
                };
                storage.insert_item(item).await?;
                self.retag(&id, &server.tags).await?;
                Ok(MergeOutcome::Pulled)
            }
            Some(local) => {
                if server_updated > local.updated_at {
                    let metadata = server.metadata.as_ref().map(|v| v.to_string());
                    let patch = ItemPatch {
                        content: Some(server.content.clone()),
                        metadata: Some(metadata),
                        updated_at: Some(server_updated),
                        synced_at: Some(now),
                        ..Default::default()
                    };
                    storage.update_item(&local.id, patch).await?;
                    self.retag(&local.id, &server.tags).await?;
                    Ok(MergeOutcome::Pulled)
                } else if local.updated_at > server_updated {
                    Ok(MergeOutcome::Conflict)
                } else {
                    Ok(MergeOutcome::NoOp)
                }
            }
        }
    }

    async fn retag(&self, item_id: &str, tag_names: &[String]) -> Result<()> {
        let storage = self.data_engine.storage();
        storage.clear_item_tags(item_id).await?;
        let now = self.now();
        for name in tag_names {
            let lookup = self.data_engine.get_or_create_tag(name).await?;
            storage.tag_item(item_id, &lookup.tag.id, now).await?;
        }
        Ok(())
    }

    /// §4.4.2.
    pub async fn push_to_server(&self) -> Result<PushResult> {
        let config = self.config.read().await?;
        if config.server_url.is_empty() || config.api_key.is_empty() {
            return Ok(PushResult::default());
        }

        let storage = self.data_engine.storage();
        let candidates = self.select_push_candidates(config.last_sync_time).await?;

        let mut pushed = 0u64;
        let mut failed = 0u64;

        for item in candidates {
            let tags = storage
                .get_item_tags(&item.id)
                .await?
                .into_iter()
                .map(|t| t.name)
                .collect::<Vec<_>>();
            let metadata = item
                .metadata
                .as_ref()
                .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok());
            let sync_id = if item.sync_id.is_empty() {
                item.id.clone()
            } else {
                item.sync_id.clone()
            };

            let client_item = ClientItem {
                item_type: item.item_type,
                content: item.content.clone(),
                tags,
                metadata,
                sync_id,
            };
            let body = serde_json::to_string(&client_item)
                .map_err(|e| Error::Transport(format!("failed to encode push body: {e}")))?;

            let req = WireRequest::post("/items", config.api_key.clone(), body)
                .with_profile(config.server_profile_id.as_deref());

            let resp = match self.transport.request(req).await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "push request failed");
                    failed += 1;
                    continue;
                }
            };

            check_versions(ObservedVersions {
                datastore: resp.datastore_version,
                protocol: resp.protocol_version,
            })?;

            if resp.is_error() {
                warn!(item_id = %item.id, status = resp.status, "push rejected by server");
                failed += 1;
                continue;
            }

            let parsed: PushResponse = match serde_json::from_str(&resp.body) {
                Ok(p) => p,
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "malformed push response");
                    failed += 1;
                    continue;
                }
            };

            let now = self.now();
            let patch = ItemPatch {
                sync_id: Some(parsed.id),
                sync_source: Some("server".to_string()),
                synced_at: Some(now),
                ..Default::default()
            };
            storage.update_item(&item.id, patch).await?;
            pushed += 1;
        }

        debug!(pushed, failed, "push complete");
        Ok(PushResult { pushed, failed })
    }

    async fn select_push_candidates(&self, last_sync_time: i64) -> Result<Vec<crate::model::Item>> {
        let items = self.data_engine.storage().get_all_live_items().await?;
        let selected = items
            .into_iter()
            .filter(|item| {
                if last_sync_time > 0 {
                    item.sync_source.is_empty()
                        || (item.synced_at > 0 && item.updated_at > item.synced_at)
                } else {
                    item.sync_source.is_empty()
                }
            })
            .collect();
        Ok(selected)
    }

    /// §4.4.3. Pull always precedes push; the cursor is captured before
    /// pull and committed only after push, so items touched mid-sync are
    /// re-examined on the next cycle.
    pub async fn sync_all(&self) -> Result<SyncAllResult> {
        let config = self.config.read().await?;
        if config.server_url.is_empty() {
            return Ok(SyncAllResult::default());
        }

        let start_time = self.now();
        self.reset_sync_state_if_server_changed(
            &config.server_url,
            config.server_profile_id.as_deref(),
        )
        .await?;

        let pull_result = self.pull_from_server(PullArgs::default()).await?;

        self.save_sync_server_config(&config.server_url, config.server_profile_id.as_deref())
            .await?;

        let push_result = self.push_to_server().await?;

        self.config
            .write(SyncConfigPatch {
                last_sync_time: Some(start_time),
            })
            .await?;

        Ok(SyncAllResult {
            pulled: pull_result.pulled,
            pushed: push_result.pushed,
            conflicts: pull_result.conflicts,
            failed: push_result.failed,
            last_sync_time: start_time,
        })
    }

    /// §4.4.4.
    pub async fn get_sync_status(&self) -> Result<SyncStatus> {
        let config = self.config.read().await?;
        let configured = !config.server_url.is_empty() && !config.api_key.is_empty();
        let pending_count = if configured {
            self.select_push_candidates(config.last_sync_time)
                .await?
                .len() as u64
        } else {
            0
        };
        Ok(SyncStatus {
            configured,
            last_sync_time: config.last_sync_time,
            pending_count,
        })
    }

    /// §4.4.5.
    pub async fn reset_sync_state_if_server_changed(
        &self,
        server_url: &str,
        server_profile_id: Option<&str>,
    ) -> Result<bool> {
        let storage = self.data_engine.storage();
        let prev_url = storage
            .get_setting(SETTING_LAST_SYNC_SERVER_URL)
            .await?
            .map(|s| s.value);
        let prev_profile = storage
            .get_setting(SETTING_LAST_SYNC_PROFILE_ID)
            .await?
            .map(|s| s.value);

        if prev_url.is_none() && prev_profile.is_none() {
            return Ok(false);
        }

        let url_differs = prev_url.as_deref() != Some(server_url);
        let profile_differs = prev_profile.as_deref() != server_profile_id;
        if !url_differs && !profile_differs {
            return Ok(false);
        }

        for item in storage.get_all_live_items().await? {
            let patch = ItemPatch {
                sync_source: Some(String::new()),
                synced_at: Some(0),
                sync_id: Some(String::new()),
                ..Default::default()
            };
            storage.update_item(&item.id, patch).await?;
        }

        self.config
            .write(SyncConfigPatch {
                last_sync_time: Some(0),
            })
            .await?;

        warn!(server_url, "server identity changed, sync state reset");
        Ok(true)
    }

    async fn save_sync_server_config(
        &self,
        server_url: &str,
        server_profile_id: Option<&str>,
    ) -> Result<()> {
        let storage = self.data_engine.storage();
        storage
            .set_setting(SETTING_LAST_SYNC_SERVER_URL, server_url)
            .await?;
        storage
            .set_setting(SETTING_LAST_SYNC_PROFILE_ID, server_profile_id.unwrap_or(""))
            .await?;
        Ok(())
    }
}
