use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};

use crate::domain::entry::{EntryField, FileEntry, FragmentRef};
use crate::error::AppError;
use crate::utils::paths::{normalize_path, split_path};

type Result<T> = std::result::Result<T, AppError>;

/// Document-style metadata store. Each call is atomic on its own; nothing spans
/// several documents.
#[async_trait::async_trait]
pub trait EntryRepository: Send + Sync {
    async fn create_entry(&self, entry: FileEntry) -> Result<String>;

    async fn get_by_id(&self, id: &str) -> Result<Option<FileEntry>>;

    /// Looks an entry up by its full path (parent path + own name).
    async fn get_by_path(&self, path: &str) -> Result<Option<FileEntry>>;

    /// Entries whose parent path equals `path`.
    async fn list_by_parent_path(&self, path: &str) -> Result<Vec<FileEntry>>;

    async fn update_field(&self, id: &str, field: EntryField) -> Result<()>;

    async fn delete_by_id(&self, id: &str) -> Result<()>;

    async fn exists_by_path(&self, path: &str) -> Result<bool> {
        Ok(self.get_by_path(path).await?.is_some())
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: String,
    name: String,
    path: String,
    is_directory: bool,
    size: i64,
    current_size: i64,
    total_fragments: i64,
    processing: bool,
    tags: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FragmentRow {
    sequence_name: String,
    container_id: String,
    object_id: String,
    size: i64,
}

impl From<FragmentRow> for FragmentRef {
    fn from(row: FragmentRow) -> Self {
        FragmentRef {
            sequence_name: row.sequence_name,
            container_id: row.container_id,
            object_id: row.object_id,
            size: row.size as u64,
        }
    }
}

#[derive(Debug)]
pub struct SqliteEntryRepository {
    pub pool: Arc<SqlitePool>,
}

impl SqliteEntryRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    async fn fragments_of(&self, id: &str) -> Result<Vec<FragmentRef>> {
        let rows = sqlx::query_as::<_, FragmentRow>(
            "SELECT sequence_name, container_id, object_id, size FROM fragments WHERE entry_id = $1 ORDER BY rowid",
        )
        .bind(id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(FragmentRef::from).collect())
    }

    async fn hydrate(&self, row: EntryRow) -> Result<FileEntry> {
        let fragments = self.fragments_of(&row.id).await?;
        let tags: BTreeSet<String> = serde_json::from_str(&row.tags).unwrap_or_else(|e| {
            tracing::warn!("entry {} carries unreadable tags: {e}", row.id);
            BTreeSet::new()
        });
        Ok(FileEntry {
            id: row.id,
            name: row.name,
            path: row.path,
            is_directory: row.is_directory,
            size: row.size as u64,
            current_size: row.current_size as u64,
            total_fragments: row.total_fragments as u64,
            fragments,
            processing: row.processing,
            created_at: row.created_at,
            tags,
        })
    }

    async fn insert_fragments(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
        fragments: &[FragmentRef],
    ) -> Result<()> {
        for fragment in fragments {
            sqlx::query(
                "INSERT INTO fragments (entry_id, sequence_name, container_id, object_id, size) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(&fragment.sequence_name)
            .bind(&fragment.container_id)
            .bind(&fragment.object_id)
            .bind(fragment.size as i64)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

fn tags_to_json(tags: &BTreeSet<String>) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

#[async_trait::async_trait]
impl EntryRepository for SqliteEntryRepository {
    async fn create_entry(&self, entry: FileEntry) -> Result<String> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO entries (id, name, path, is_directory, size, current_size, total_fragments, processing, tags, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&entry.id)
        .bind(&entry.name)
        .bind(normalize_path(&entry.path))
        .bind(entry.is_directory)
        .bind(entry.size as i64)
        .bind(entry.current_size as i64)
        .bind(entry.total_fragments as i64)
        .bind(entry.processing)
        .bind(tags_to_json(&entry.tags))
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::AlreadyExists(entry.full_path()));
            }
            Err(e) => return Err(e.into()),
        }

        Self::insert_fragments(&mut tx, &entry.id, &entry.fragments).await?;
        tx.commit().await?;
        Ok(entry.id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<FileEntry>> {
        let row = sqlx::query_as::<_, EntryRow>("SELECT * FROM entries WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_by_path(&self, path: &str) -> Result<Option<FileEntry>> {
        let (parent, name) = split_path(path);
        let row =
            sqlx::query_as::<_, EntryRow>("SELECT * FROM entries WHERE path = $1 AND name = $2")
                .bind(parent)
                .bind(name)
                .fetch_optional(self.pool.as_ref())
                .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_by_parent_path(&self, path: &str) -> Result<Vec<FileEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            "SELECT * FROM entries WHERE path = $1 ORDER BY is_directory DESC, name",
        )
        .bind(normalize_path(path))
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(self.hydrate(row).await?);
        }
        Ok(entries)
    }

    async fn update_field(&self, id: &str, field: EntryField) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let result = match &field {
            EntryField::Name(name) => {
                sqlx::query("UPDATE entries SET name = $1 WHERE id = $2")
                    .bind(name)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
            EntryField::Path(path) => {
                sqlx::query("UPDATE entries SET path = $1 WHERE id = $2")
                    .bind(normalize_path(path))
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
            EntryField::CurrentSize(size) => {
                sqlx::query("UPDATE entries SET current_size = $1 WHERE id = $2")
                    .bind(*size as i64)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
            EntryField::Processing(processing) => {
                sqlx::query("UPDATE entries SET processing = $1 WHERE id = $2")
                    .bind(*processing)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
            EntryField::Tags(tags) => {
                sqlx::query("UPDATE entries SET tags = $1 WHERE id = $2")
                    .bind(tags_to_json(tags))
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
            EntryField::Fragments(_) => {
                // touch the row so a missing id is reported like the other fields
                sqlx::query("UPDATE entries SET id = id WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
        };

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::AlreadyExists(format!("entry {id}")));
            }
            Err(e) => return Err(e.into()),
        };
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("entry {id}")));
        }

        if let EntryField::Fragments(fragments) = &field {
            sqlx::query("DELETE FROM fragments WHERE entry_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::insert_fragments(&mut tx, id, fragments).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM fragments WHERE entry_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("entry {id}")));
        }
        tx.commit().await?;
        Ok(())
    }
}
