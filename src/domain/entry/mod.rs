pub mod memory;
pub mod model;
pub mod repository;

pub use memory::InMemoryEntryRepository;
pub use model::{EntryField, FileEntry, FragmentRef};
pub use repository::{EntryRepository, SqliteEntryRepository};
