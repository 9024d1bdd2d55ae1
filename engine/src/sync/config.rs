//! Sync configuration provider (§9 design note: "callback-based config →
//! Provider { read, write }"). The host owns `serverUrl`/`apiKey`/cursor;
//! the Sync Engine never reads them from the environment.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::storage::StorageAdapter;

/// Sync configuration as read by the Sync Engine (spec.md §4.4).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncConfig {
    pub server_url: String,
    pub api_key: String,
    pub server_profile_id: Option<String>,
    pub last_sync_time: i64,
}

/// Fields the Sync Engine is allowed to rewrite after a sync cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncConfigPatch {
    pub last_sync_time: Option<i64>,
}

/// Host-supplied configuration handle, read at the start of every sync
/// operation and written back only with the cursor at the end of
/// `syncAll` (§4.4.3).
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn read(&self) -> Result<SyncConfig>;
    async fn write(&self, patch: SyncConfigPatch) -> Result<()>;
}

/// An in-memory provider, suitable for tests and for hosts that keep their
/// own settings store outside the Storage Adapter.
pub struct InMemoryConfigProvider {
    inner: Mutex<SyncConfig>,
}

impl InMemoryConfigProvider {
    pub fn new(config: SyncConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(config),
        })
    }
}

#[async_trait]
impl ConfigProvider for InMemoryConfigProvider {
    async fn read(&self) -> Result<SyncConfig> {
        Ok(self.inner.lock().expect("config mutex poisoned").clone())
    }

    async fn write(&self, patch: SyncConfigPatch) -> Result<()> {
        let mut guard = self.inner.lock().expect("config mutex poisoned");
        if let Some(last_sync_time) = patch.last_sync_time {
            guard.last_sync_time = last_sync_time;
        }
        Ok(())
    }
}

const SETTING_SERVER_URL: &str = "sync_config_serverUrl";
const SETTING_API_KEY: &str = "sync_config_apiKey";
const SETTING_SERVER_PROFILE_ID: &str = "sync_config_serverProfileId";
const SETTING_LAST_SYNC_TIME: &str = "sync_config_lastSyncTime";

/// A [`ConfigProvider`] backed by the same [`StorageAdapter`] settings rows
/// the Sync Engine already uses for server-change detection, so a host does
/// not have to wire a separate config store just to run sync (§4.4).
pub struct SettingsConfigProvider {
    storage: Arc<dyn StorageAdapter>,
}

impl SettingsConfigProvider {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Arc<Self> {
        Arc::new(Self { storage })
    }

    async fn setting(&self, key: &str) -> Result<String> {
        Ok(self
            .storage
            .get_setting(key)
            .await?
            .map(|s| s.value)
            .unwrap_or_default())
    }

    /// Host-side setup: writes `serverUrl`/`apiKey`/`serverProfileId`, the
    /// fields the Sync Engine itself never rewrites (§4.4).
    pub async fn configure(
        &self,
        server_url: &str,
        api_key: &str,
        server_profile_id: Option<&str>,
    ) -> Result<()> {
        self.storage.set_setting(SETTING_SERVER_URL, server_url).await?;
        self.storage.set_setting(SETTING_API_KEY, api_key).await?;
        self.storage
            .set_setting(SETTING_SERVER_PROFILE_ID, server_profile_id.unwrap_or(""))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigProvider for SettingsConfigProvider {
    async fn read(&self) -> Result<SyncConfig> {
        let server_url = self.setting(SETTING_SERVER_URL).await?;
        let api_key = self.setting(SETTING_API_KEY).await?;
        let server_profile_id = self.setting(SETTING_SERVER_PROFILE_ID).await?;
        let last_sync_time = self.setting(SETTING_LAST_SYNC_TIME).await?;

        Ok(SyncConfig {
            server_url,
            api_key,
            server_profile_id: if server_profile_id.is_empty() {
                None
            } else {
                Some(server_profile_id)
            },
            last_sync_time: last_sync_time.parse().unwrap_or(0),
        })
    }

    async fn write(&self, patch: SyncConfigPatch) -> Result<()> {
        if let Some(last_sync_time) = patch.last_sync_time {
            self.storage
                .set_setting(SETTING_LAST_SYNC_TIME, &last_sync_time.to_string())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_only_touches_patched_fields() {
        let provider = InMemoryConfigProvider::new(SyncConfig {
            server_url: "https://sync.test".into(),
            api_key: "k".into(),
            server_profile_id: None,
            last_sync_time: 0,
        });
        provider
            .write(SyncConfigPatch {
                last_sync_time: Some(1234),
            })
            .await
            .unwrap();
        let config = provider.read().await.unwrap();
        assert_eq!(config.last_sync_time, 1234);
        assert_eq!(config.server_url, "https://sync.test");
    }

    #[tokio::test]
    async fn settings_provider_round_trips_through_storage() {
        use crate::storage::MemoryStorage;

        let storage = Arc::new(MemoryStorage::new());
        let provider = SettingsConfigProvider::new(storage);

        let empty = provider.read().await.unwrap();
        assert_eq!(empty, SyncConfig::default());

        provider
            .configure("https://sync.test", "key-1", Some("profile-1"))
            .await
            .unwrap();
        provider
            .write(SyncConfigPatch {
                last_sync_time: Some(4242),
            })
            .await
            .unwrap();

        let config = provider.read().await.unwrap();
        assert_eq!(config.server_url, "https://sync.test");
        assert_eq!(config.api_key, "key-1");
        assert_eq!(config.server_profile_id.as_deref(), Some("profile-1"));
        assert_eq!(config.last_sync_time, 4242);
    }
}
