use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::paths::{ROOT, join_path};

/// Location of one stored fragment. `container_id`/`object_id` are the two-level
/// locator of the hosting service (e.g. channel + message of a CDN attachment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FragmentRef {
    /// 1-based chunk index, stored as text.
    pub sequence_name: String,
    pub container_id: String,
    pub object_id: String,
    #[serde(default)]
    pub size: u64,
}

impl FragmentRef {
    pub fn new(
        sequence: u64,
        container_id: impl Into<String>,
        object_id: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            sequence_name: sequence.to_string(),
            container_id: container_id.into(),
            object_id: object_id.into(),
            size,
        }
    }

    /// Integer value of `sequence_name`; anything unparsable counts as `0`.
    pub fn sequence_number(&self) -> i64 {
        self.sequence_name.parse().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    /// Parent directory path, not including `name`.
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    pub current_size: u64,
    pub total_fragments: u64,
    pub fragments: Vec<FragmentRef>,
    pub processing: bool,
    pub created_at: DateTime<Utc>,
    pub tags: BTreeSet<String>,
}

impl FileEntry {
    /// A freshly ingested file: no fragments yet, marked as processing.
    pub fn new_file(
        name: impl Into<String>,
        path: impl Into<String>,
        size: u64,
        total_fragments: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            path: path.into(),
            is_directory: false,
            size,
            current_size: 0,
            total_fragments,
            fragments: Vec::new(),
            processing: true,
            created_at: Utc::now(),
            tags: BTreeSet::new(),
        }
    }

    pub fn new_directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            path: path.into(),
            is_directory: true,
            size: 0,
            current_size: 0,
            total_fragments: 0,
            fragments: Vec::new(),
            processing: false,
            created_at: Utc::now(),
            tags: BTreeSet::new(),
        }
    }

    pub fn new_root() -> Self {
        Self::new_directory(ROOT, ROOT)
    }

    pub fn is_root(&self) -> bool {
        self.is_directory && self.name == ROOT && self.path == ROOT
    }

    /// Path of the entry itself (parent path + own name).
    pub fn full_path(&self) -> String {
        if self.is_root() {
            ROOT.to_string()
        } else {
            join_path(&self.path, &self.name)
        }
    }

    pub fn uploaded_fragments(&self) -> u64 {
        self.fragments.len() as u64
    }

    pub fn is_complete(&self) -> bool {
        self.uploaded_fragments() == self.total_fragments
    }
}

/// One mutable field of an entry, as written by rename/move or by the external consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryField {
    Name(String),
    Path(String),
    CurrentSize(u64),
    Processing(bool),
    Fragments(Vec<FragmentRef>),
    Tags(BTreeSet<String>),
}

impl EntryField {
    pub fn apply(self, entry: &mut FileEntry) {
        match self {
            EntryField::Name(name) => entry.name = name,
            EntryField::Path(path) => entry.path = path,
            EntryField::CurrentSize(size) => entry.current_size = size,
            EntryField::Processing(processing) => entry.processing = processing,
            EntryField::Fragments(fragments) => entry.fragments = fragments,
            EntryField::Tags(tags) => entry.tags = tags,
        }
    }
}
