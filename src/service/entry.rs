use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::error::AppError;
use crate::namespace;
use crate::utils::paths::ROOT;
use crate::utils::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MkdirForm {
    pub name: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameForm {
    pub new_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveForm {
    pub newpath: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{field} cant be empty")))
}

/// POST /api/v1/mkdir
pub async fn mkdir_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<MkdirForm>,
) -> Result<impl IntoResponse, AppError> {
    let name = required(form.name, "name")?;
    let path = form.path.unwrap_or_else(|| ROOT.to_string());
    namespace::create_dir(state.store.as_ref(), &path, &name).await?;
    Ok(StatusCode::CREATED)
}

/// POST /api/v1/rename/{id}
pub async fn rename_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<RenameForm>,
) -> Result<impl IntoResponse, AppError> {
    let new_name = required(form.new_name, "new_name")?;
    namespace::rename(state.store.as_ref(), &id, &new_name).await?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/move/{id}
pub async fn move_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<MoveForm>,
) -> Result<impl IntoResponse, AppError> {
    let newpath = required(form.newpath, "newpath")?;
    namespace::move_entry(state.store.as_ref(), &id, &newpath).await?;
    Ok(StatusCode::OK)
}

/// DELETE /api/v1/delete/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    namespace::delete(state.store.as_ref(), &id).await?;
    Ok(StatusCode::OK)
}
