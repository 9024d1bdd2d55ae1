//! The Sync Engine (SE, §4.4): keeps the local store and a named remote
//! "profile" on the server in eventual agreement under last-write-wins on
//! `updatedAt`.

pub mod config;
pub mod engine;
pub mod transport;
pub mod wire;

pub use config::{ConfigProvider, InMemoryConfigProvider, SettingsConfigProvider, SyncConfig, SyncConfigPatch};
pub use engine::{PullArgs, PullResult, PushResult, SyncAllResult, SyncEngine, SyncStatus};
pub use transport::{HttpMethod, ReqwestTransport, SyncTransport, TransportError, WireRequest, WireResponse};
