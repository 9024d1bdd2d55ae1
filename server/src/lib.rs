//! Library surface exposed for integration tests; `main.rs` wires the same
//! modules into the running binary.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod version;

use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: db::Pool,
    pub config: Arc<config::Config>,
}
