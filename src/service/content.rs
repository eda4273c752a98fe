use std::io;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Response, StatusCode, Uri, header};
use axum::response::IntoResponse;
use tokio_util::io::ReaderStream;

use crate::error::AppError;
use crate::service::dir::DisplayEntry;
use crate::utils::state::AppState;

const CACHE_CONTROL: &str = "max-age=3600";

/// GET /{path}
///
/// Serves an entry by path. Files stream their reassembled fragments; directories
/// answer with their listing.
pub async fn content_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Result<Response<Body>, AppError> {
    if method != Method::GET {
        return Ok((StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response());
    }

    let handle = state.vfs.open(uri.path()).await?;
    if handle.is_directory() {
        let children = handle.list().await?;
        let listing: Vec<DisplayEntry> = children.into_iter().map(DisplayEntry::from).collect();
        return Ok(Json(listing).into_response());
    }

    let entry = handle.entry().clone();
    let reader = handle.into_reader().await?;
    tracing::debug!("streaming {} ({} fragments)", entry.full_path(), reader.len());

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CACHE_CONTROL, CACHE_CONTROL);
    // a partial file would advertise more bytes than it can deliver
    if entry.is_complete() {
        builder = builder.header(header::CONTENT_LENGTH, entry.size);
    }
    builder
        .body(Body::from_stream(ReaderStream::new(reader)))
        .map_err(|e| AppError::Io(io::Error::other(e)))
}
