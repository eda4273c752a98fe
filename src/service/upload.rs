use std::io;
use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::StreamReader;

use crate::error::AppError;
use crate::ingest::UploadRequest;
use crate::status::status;
use crate::utils::paths::ROOT;
use crate::utils::size::human_bytes;
use crate::utils::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub path: Option<String>,
    pub size: Option<u64>,
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("malformed multipart body: {err}"))
}

/// POST /api/v1/upload
///
/// Multipart fields `path` and `size` (or the same query parameters) must come
/// before the `file` part, which is streamed straight into the ingest pipeline.
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut path = params.path;
    let mut size = params.size;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("path") => path = Some(field.text().await.map_err(bad_multipart)?),
            Some("size") => {
                let text = field.text().await.map_err(bad_multipart)?;
                let parsed = text
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| AppError::BadRequest(format!("invalid size {text:?}")))?;
                size = Some(parsed);
            }
            Some("file") => {
                let declared_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::BadRequest("the file part has no file name".to_string()))?;
                let declared_size = size.ok_or_else(|| {
                    AppError::BadRequest("size must be sent before the file part".to_string())
                })?;
                let request = UploadRequest {
                    target_path: path.take().unwrap_or_else(|| ROOT.to_string()),
                    declared_name,
                    declared_size,
                };
                tracing::info!(
                    "got file {} with size {}",
                    request.declared_name,
                    human_bytes(declared_size)
                );

                let reader = StreamReader::new(field.map_err(io::Error::other));
                tokio::pin!(reader);
                let cancel = state.shutdown.child_token();
                let id = state.ingestor.upload(request, reader, &cancel).await?;
                return Ok((StatusCode::CREATED, Json(json!({ "id": id }))));
            }
            _ => {}
        }
    }

    Err(AppError::BadRequest(
        "the multipart body has no file part".to_string(),
    ))
}

/// GET /api/v1/status/{id}
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let report = status(state.store.as_ref(), &id).await?;
    Ok(Json(report))
}
