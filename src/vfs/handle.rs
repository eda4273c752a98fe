use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::io::AsyncReadExt;

use crate::cadapter::FragmentClient;
use crate::domain::entry::{EntryRepository, FileEntry};
use crate::error::AppError;
use crate::fragment::FragmentReader;

enum HandleState {
    /// No fragment has been fetched yet.
    Unopened,
    Opened(FragmentReader),
    Closed,
}

/// An open entry. For files the reconstruction reader is built lazily, exactly
/// once, on the first read.
pub struct Handle {
    entry: FileEntry,
    store: Arc<dyn EntryRepository>,
    client: FragmentClient,
    state: HandleState,
}

impl Handle {
    pub(super) fn new(entry: FileEntry, store: Arc<dyn EntryRepository>, client: FragmentClient) -> Self {
        Self {
            entry,
            store,
            client,
            state: HandleState::Unopened,
        }
    }

    /// The entry as it was when the handle was opened.
    pub fn entry(&self) -> &FileEntry {
        &self.entry
    }

    pub fn is_directory(&self) -> bool {
        self.entry.is_directory
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AppError> {
        if self.entry.is_directory {
            return Err(AppError::IsADirectory(self.entry.full_path()));
        }

        if matches!(self.state, HandleState::Unopened) {
            match self.client.read_fragments(&self.entry.fragments).await {
                Ok(reader) => self.state = HandleState::Opened(reader),
                Err(e) => {
                    self.state = HandleState::Closed;
                    return Err(e);
                }
            }
        }

        match &mut self.state {
            HandleState::Opened(reader) => reader.read(buf).await.map_err(AppError::from_read),
            _ => Err(closed(&self.entry)),
        }
    }

    /// Seeking is accepted and ignored; reads always continue where they left off.
    pub fn seek(&mut self, _pos: u64) -> Result<u64, AppError> {
        Ok(0)
    }

    /// The entry as it is now in the metadata store.
    ///
    /// The returned future owns what it needs, so it stays `Send` even while the
    /// handle holds open fragment streams.
    pub fn stat(&self) -> impl Future<Output = Result<FileEntry, AppError>> + Send + use<> {
        let store = self.store.clone();
        let id = self.entry.id.clone();
        let full_path = self.entry.full_path();
        async move {
            store
                .get_by_id(&id)
                .await?
                .ok_or(AppError::NotFound(full_path))
        }
    }

    /// Children of the directory, without the directory itself.
    pub fn list(&self) -> impl Future<Output = Result<Vec<FileEntry>, AppError>> + Send + use<> {
        let store = self.store.clone();
        let entry = self.entry.clone();
        async move {
            if !entry.is_directory {
                return Err(AppError::NotADirectory(entry.full_path()));
            }
            let children = store.list_by_parent_path(&entry.full_path()).await?;
            Ok(children
                .into_iter()
                .filter(|child| child.id != entry.id)
                .collect())
        }
    }

    pub async fn close(&mut self) -> Result<(), AppError> {
        match std::mem::replace(&mut self.state, HandleState::Closed) {
            HandleState::Opened(mut reader) => Ok(reader.close().await?),
            _ => Ok(()),
        }
    }

    /// Gives up the handle for its reconstruction reader, for streaming the
    /// whole file. The caller becomes responsible for closing the reader.
    pub async fn into_reader(mut self) -> Result<FragmentReader, AppError> {
        if self.entry.is_directory {
            return Err(AppError::IsADirectory(self.entry.full_path()));
        }
        match std::mem::replace(&mut self.state, HandleState::Closed) {
            HandleState::Unopened => self.client.read_fragments(&self.entry.fragments).await,
            HandleState::Opened(reader) => Ok(reader),
            HandleState::Closed => Err(closed(&self.entry)),
        }
    }
}

fn closed(entry: &FileEntry) -> AppError {
    AppError::Io(io::Error::other(format!(
        "handle for {} is closed",
        entry.full_path()
    )))
}
