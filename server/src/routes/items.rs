//! Item routes (§6.1): the three endpoints the Sync Engine speaks to.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::items::{create_item, list_items, list_items_since};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/since/{since}", get(list_items_since))
}
