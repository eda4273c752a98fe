//! Virtual filesystem over the metadata store
//!
//! A path resolves to one `FileEntry`. Files read as the concatenation of their
//! fragments (fetched through the configured backend), directories list their
//! children. Opening never touches fragment storage; the first read does.

mod handle;

use std::sync::Arc;

pub use handle::Handle;

use crate::cadapter::FragmentClient;
use crate::domain::entry::EntryRepository;
use crate::error::AppError;
use crate::utils::paths::normalize_path;

#[derive(Clone)]
pub struct Vfs {
    store: Arc<dyn EntryRepository>,
    client: FragmentClient,
}

impl Vfs {
    pub fn new(store: Arc<dyn EntryRepository>, client: FragmentClient) -> Self {
        Self { store, client }
    }

    /// Binds a handle to the entry at `path`. A trailing slash is ignored.
    pub async fn open(&self, path: &str) -> Result<Handle, AppError> {
        let path = normalize_path(path);
        let entry = self
            .store
            .get_by_path(&path)
            .await?
            .ok_or_else(|| AppError::NotFound(path.clone()))?;
        tracing::debug!("opened {path} (id {})", entry.id);
        Ok(Handle::new(entry, self.store.clone(), self.client.clone()))
    }
}
