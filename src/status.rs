use serde::Serialize;

use crate::domain::entry::EntryRepository;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UploadState {
    #[serde(rename = "done")]
    Done,
    #[serde(rename = "in progress")]
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub state: UploadState,
    pub total_fragments: u64,
    pub uploaded_fragments: u64,
}

/// Completion state of an entry, computed from its fragment counts on every call.
pub async fn status(store: &dyn EntryRepository, id: &str) -> Result<StatusReport, AppError> {
    let entry = store
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("entry {id}")))?;

    let uploaded = entry.uploaded_fragments();
    let state = if uploaded == entry.total_fragments {
        UploadState::Done
    } else {
        UploadState::InProgress
    };
    Ok(StatusReport {
        state,
        total_fragments: entry.total_fragments,
        uploaded_fragments: uploaded,
    })
}
