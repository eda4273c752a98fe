//! Directory tree operations over the metadata store: root bootstrap, mkdir,
//! rename, move and (non-recursive) delete.
//!
//! None of these touch fragment storage. Renaming or moving a directory rewrites
//! the `path` of everything below it so full paths stay consistent.

use std::collections::VecDeque;

use crate::domain::entry::{EntryField, EntryRepository, FileEntry};
use crate::error::AppError;
use crate::utils::paths::{ROOT, is_within, join_path, normalize_path};
use crate::utils::validation::{is_valid_path, is_valid_segment, sanitize_filename};

type Result<T> = std::result::Result<T, AppError>;

/// Creates the root directory entry if the store does not have one yet.
pub async fn ensure_root(store: &dyn EntryRepository) -> Result<()> {
    if store.get_by_path(ROOT).await?.is_some() {
        return Ok(());
    }
    match store.create_entry(FileEntry::new_root()).await {
        Ok(id) => {
            tracing::info!("created root directory entry {id}");
            Ok(())
        }
        // another instance won the race
        Err(AppError::AlreadyExists(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn create_dir(store: &dyn EntryRepository, path: &str, name: &str) -> Result<String> {
    if !is_valid_path(path) {
        return Err(AppError::InvalidPath(path.to_string()));
    }
    if !is_valid_segment(name) {
        return Err(AppError::InvalidName(name.to_string()));
    }
    let path = normalize_path(path);
    require_directory(store, &path).await?;

    let full = join_path(&path, name);
    if store.exists_by_path(&full).await? {
        return Err(AppError::AlreadyExists(full));
    }
    let id = store.create_entry(FileEntry::new_directory(name, path)).await?;
    tracing::info!("created directory {full}");
    Ok(id)
}

pub async fn rename(store: &dyn EntryRepository, id: &str, new_name: &str) -> Result<()> {
    let entry = get_movable(store, id).await?;

    let name = sanitize_filename(new_name);
    let valid = if entry.is_directory {
        is_valid_segment(&name)
    } else {
        !name.is_empty()
    };
    if !valid {
        return Err(AppError::InvalidName(new_name.to_string()));
    }
    if name == entry.name {
        return Ok(());
    }

    let target = join_path(&entry.path, &name);
    if store.exists_by_path(&target).await? {
        return Err(AppError::AlreadyExists(target));
    }

    let old_full = entry.full_path();
    store.update_field(id, EntryField::Name(name)).await?;
    if entry.is_directory {
        rewrite_descendants(store, &old_full, &target).await?;
    }
    tracing::info!("renamed {old_full} to {target}");
    Ok(())
}

/// Moves an entry into the directory `new_path`, keeping its name.
pub async fn move_entry(store: &dyn EntryRepository, id: &str, new_path: &str) -> Result<()> {
    if !is_valid_path(new_path) {
        return Err(AppError::InvalidPath(new_path.to_string()));
    }
    let entry = get_movable(store, id).await?;
    let new_path = normalize_path(new_path);
    if new_path == entry.path {
        return Ok(());
    }

    let old_full = entry.full_path();
    if entry.is_directory && is_within(&new_path, &old_full) {
        return Err(AppError::BadRequest(format!(
            "cannot move {old_full} into itself"
        )));
    }
    require_directory(store, &new_path).await?;

    let target = join_path(&new_path, &entry.name);
    if store.exists_by_path(&target).await? {
        return Err(AppError::AlreadyExists(target));
    }

    store.update_field(id, EntryField::Path(new_path)).await?;
    if entry.is_directory {
        rewrite_descendants(store, &old_full, &target).await?;
    }
    tracing::info!("moved {old_full} to {target}");
    Ok(())
}

/// Deletes a file or an empty directory. Fragments already hosted are left alone.
pub async fn delete(store: &dyn EntryRepository, id: &str) -> Result<()> {
    let entry = store
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("could not delete {id}: no such entry")))?;
    if entry.is_root() {
        return Err(AppError::BadRequest("the root directory cannot be deleted".to_string()));
    }
    if entry.is_directory {
        let full = entry.full_path();
        if !store.list_by_parent_path(&full).await?.is_empty() {
            return Err(AppError::DirectoryNotEmpty(full));
        }
    }
    store.delete_by_id(id).await?;
    tracing::info!("deleted {}", entry.full_path());
    Ok(())
}

async fn get_movable(store: &dyn EntryRepository, id: &str) -> Result<FileEntry> {
    let entry = store
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("entry {id}")))?;
    if entry.is_root() {
        return Err(AppError::BadRequest(
            "the root directory cannot be renamed or moved".to_string(),
        ));
    }
    Ok(entry)
}

/// Fails unless `path` names an existing directory.
pub(crate) async fn require_directory(store: &dyn EntryRepository, path: &str) -> Result<()> {
    match store.get_by_path(path).await? {
        Some(dir) if dir.is_directory => Ok(()),
        Some(_) => Err(AppError::NotADirectory(path.to_string())),
        None => Err(AppError::BadRequest(format!(
            "directory {path} does not exist"
        ))),
    }
}

/// Points every entry below `old_root` at the matching location below `new_root`.
async fn rewrite_descendants(store: &dyn EntryRepository, old_root: &str, new_root: &str) -> Result<()> {
    let mut queue = VecDeque::from([(old_root.to_string(), new_root.to_string())]);
    while let Some((old_dir, new_dir)) = queue.pop_front() {
        for child in store.list_by_parent_path(&old_dir).await? {
            if child.is_directory {
                queue.push_back((
                    join_path(&old_dir, &child.name),
                    join_path(&new_dir, &child.name),
                ));
            }
            store
                .update_field(&child.id, EntryField::Path(new_dir.clone()))
                .await?;
        }
    }
    Ok(())
}
