//! # Pocket Engine
//!
//! The Datastore + Sync Engine core of the pocket knowledge application: a
//! storage-adapter-mediated data layer (items, tags, associations,
//! settings, dedup, frecency) together with its bidirectional
//! synchronization protocol (pull, push, last-write-wins merge,
//! server-change detection, version negotiation).
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of files, network sockets, or
//!   platform beyond the [`storage::StorageAdapter`] and
//!   [`sync::transport::SyncTransport`] trait seams it is handed.
//! - **Single-threaded cooperative**: one [`DataEngine`] instance assumes no
//!   parallel callers against itself; wrap it in a mutex for cross-task use.
//! - **Testable**: pure logic behind trait seams; [`storage::MemoryStorage`]
//!   and a stub transport exercise the full protocol without real IO.
//!
//! ## Components
//!
//! 1. **Storage Adapter (SA)** — [`storage::StorageAdapter`], with
//!    [`storage::MemoryStorage`] and [`storage::SqliteStorage`]
//!    implementations.
//! 2. **Frecency Function (FF)** — [`frecency::score`].
//! 3. **Data Engine (DE)** — [`DataEngine`], enforcing item/tag invariants,
//!    deduplication, and statistics over a storage adapter.
//! 4. **Sync Engine (SE)** — [`sync::engine::SyncEngine`], speaking the wire
//!    protocol and driving last-write-wins merge.
//! 5. **Version Gate (VG)** — [`version`], a pair of integer constants and a
//!    shared header-comparison helper.
//!
//! ## Quick start
//!
//! ```rust
//! use pocket_engine::{DataEngine, storage::MemoryStorage};
//! use pocket_engine::model::ItemType;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let de = DataEngine::new(Arc::new(MemoryStorage::new()));
//! let outcome = de
//!     .save_item(ItemType::Text, Some("hello".into()), &["note".to_string()], None, None)
//!     .await
//!     .unwrap();
//! assert!(outcome.created);
//! # }
//! ```

pub mod data_engine;
pub mod error;
pub mod frecency;
pub mod id;
pub mod model;
pub mod storage;
pub mod sync;
pub mod time;
pub mod version;

pub use data_engine::DataEngine;
pub use error::Error;
