use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::service::dir::{list_dir_handler, list_root_handler};
use crate::service::entry::{delete_handler, mkdir_handler, move_handler, rename_handler};
use crate::service::upload::{status_handler, upload_handler};
use crate::utils::state::AppState;

pub fn create_v1_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload_handler))
        .route("/status/{id}", get(status_handler))
        .route("/mkdir", post(mkdir_handler))
        .route("/rename/{id}", post(rename_handler))
        .route("/move/{id}", post(move_handler))
        .route("/delete/{id}", delete(delete_handler))
        .route("/dir", get(list_root_handler))
        .route("/dir/", get(list_root_handler))
        .route("/dir/{*path}", get(list_dir_handler))
}
