use crate::domain::entry::EntryRepository;
use crate::error::AppError;
use crate::utils::paths::join_path;
use crate::utils::validation::sanitize_filename;

/// Splits `a.tar.gz` into (`a.tar`, `.gz`); a name without a dot has no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

/// Sanitizes `desired` and appends `(n)` before the extension until no sibling
/// under `path` carries the name, e.g. `a.txt` -> `a(1).txt` -> `a(2).txt`.
pub async fn resolve_unique_name(
    store: &dyn EntryRepository,
    path: &str,
    desired: &str,
) -> Result<String, AppError> {
    let sanitized = sanitize_filename(desired);
    if sanitized.is_empty() {
        return Err(AppError::InvalidName(desired.to_string()));
    }

    let (stem, ext) = split_extension(&sanitized);
    let mut candidate = sanitized.clone();
    let mut n = 1u64;
    while store.exists_by_path(&join_path(path, &candidate)).await? {
        candidate = format!("{stem}({n}){ext}");
        n += 1;
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entry::{FileEntry, InMemoryEntryRepository};

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.txt"), ("a", ".txt"));
        assert_eq!(split_extension("a.tar.gz"), ("a.tar", ".gz"));
        assert_eq!(split_extension("Makefile"), ("Makefile", ""));
        assert_eq!(split_extension(".env"), ("", ".env"));
    }

    #[tokio::test]
    async fn test_collisions_are_numbered() {
        let store = InMemoryEntryRepository::new();
        assert_eq!(resolve_unique_name(&store, "/x", "a.txt").await.unwrap(), "a.txt");

        store
            .create_entry(FileEntry::new_file("a.txt", "/x", 1, 1))
            .await
            .unwrap();
        assert_eq!(resolve_unique_name(&store, "/x", "a.txt").await.unwrap(), "a(1).txt");

        store
            .create_entry(FileEntry::new_file("a(1).txt", "/x", 1, 1))
            .await
            .unwrap();
        assert_eq!(resolve_unique_name(&store, "/x", "a.txt").await.unwrap(), "a(2).txt");

        // other directories do not collide
        assert_eq!(resolve_unique_name(&store, "/y", "a.txt").await.unwrap(), "a.txt");
    }

    #[tokio::test]
    async fn test_sanitized_before_probing() {
        let store = InMemoryEntryRepository::new();
        store
            .create_entry(FileEntry::new_file("my_file.txt", "/", 1, 1))
            .await
            .unwrap();
        assert_eq!(
            resolve_unique_name(&store, "/", "my file!.txt").await.unwrap(),
            "my_file(1).txt"
        );
    }

    #[tokio::test]
    async fn test_empty_after_sanitizing_is_rejected() {
        let store = InMemoryEntryRepository::new();
        let err = resolve_unique_name(&store, "/", "???").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidName(_)));
    }
}
