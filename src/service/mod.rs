pub mod content;
pub mod dir;
pub mod entry;
pub mod upload;
