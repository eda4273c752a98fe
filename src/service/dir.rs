use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::domain::entry::FileEntry;
use crate::error::AppError;
use crate::utils::paths::ROOT;
use crate::utils::size::human_bytes;
use crate::utils::state::AppState;
use crate::utils::validation::is_valid_path;

/// One row of a directory listing as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayEntry {
    pub id: String,
    pub name: String,
    pub size: String,
    pub directory: bool,
    pub processing: bool,
    /// Full path of the entry, usable as a content URL.
    pub path: String,
}

impl From<FileEntry> for DisplayEntry {
    fn from(entry: FileEntry) -> Self {
        DisplayEntry {
            path: entry.full_path(),
            size: human_bytes(entry.size),
            directory: entry.is_directory,
            processing: entry.processing,
            id: entry.id,
            name: entry.name,
        }
    }
}

pub(crate) async fn list_directory(state: &AppState, path: &str) -> Result<Vec<DisplayEntry>, AppError> {
    let handle = state.vfs.open(path).await?;
    let children = handle.list().await?;
    Ok(children.into_iter().map(DisplayEntry::from).collect())
}

/// GET /api/v1/dir/
pub async fn list_root_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DisplayEntry>>, AppError> {
    Ok(Json(list_directory(&state, ROOT).await?))
}

/// GET /api/v1/dir/{*path}
pub async fn list_dir_handler(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<Vec<DisplayEntry>>, AppError> {
    let path = format!("/{}", path.trim_start_matches('/'));
    if !is_valid_path(&path) {
        return Err(AppError::InvalidPath(path));
    }
    Ok(Json(list_directory(&state, &path).await?))
}
