//! In-memory metadata store, used for local development and tests.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::domain::entry::{EntryField, EntryRepository, FileEntry};
use crate::error::AppError;
use crate::utils::paths::{normalize_path, split_path};

type Result<T> = std::result::Result<T, AppError>;

#[derive(Default)]
pub struct InMemoryEntryRepository {
    entries: RwLock<HashMap<String, FileEntry>>,
}

impl InMemoryEntryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait::async_trait]
impl EntryRepository for InMemoryEntryRepository {
    async fn create_entry(&self, mut entry: FileEntry) -> Result<String> {
        entry.path = normalize_path(&entry.path);
        let mut entries = self.entries.write().await;
        if entries
            .values()
            .any(|e| e.path == entry.path && e.name == entry.name)
        {
            return Err(AppError::AlreadyExists(entry.full_path()));
        }
        let id = entry.id.clone();
        entries.insert(id.clone(), entry);
        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<FileEntry>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn get_by_path(&self, path: &str) -> Result<Option<FileEntry>> {
        let (parent, name) = split_path(path);
        Ok(self
            .entries
            .read()
            .await
            .values()
            .find(|e| e.path == parent && e.name == name)
            .cloned())
    }

    async fn list_by_parent_path(&self, path: &str) -> Result<Vec<FileEntry>> {
        let path = normalize_path(path);
        let mut children: Vec<FileEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.path == path)
            .cloned()
            .collect();
        children.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(children)
    }

    async fn update_field(&self, id: &str, field: EntryField) -> Result<()> {
        let mut entries = self.entries.write().await;

        // keep (path, name) unique like the SQL constraint does
        let target = match &field {
            EntryField::Name(name) => entries
                .get(id)
                .map(|e| (e.path.clone(), name.clone())),
            EntryField::Path(path) => entries
                .get(id)
                .map(|e| (normalize_path(path), e.name.clone())),
            _ => None,
        };
        if let Some((path, name)) = target {
            if entries
                .values()
                .any(|e| e.id != id && e.path == path && e.name == name)
            {
                return Err(AppError::AlreadyExists(format!("entry {id}")));
            }
        }

        let entry = entries
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("entry {id}")))?;
        match field {
            EntryField::Path(path) => entry.path = normalize_path(&path),
            other => other.apply(entry),
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("entry {id}")))
    }
}
