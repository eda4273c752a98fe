//! Fragment ordering and reconstruction
//!
//! Submodules:
//! - `order`: recovers the sequence order of a file's unordered fragment set
//! - `reader`: concatenates opened fragment streams into one `AsyncRead`
pub mod order;
pub mod reader;

pub use order::order;
pub use reader::{FragmentReader, FragmentStream, IdleDeadline, ReaderFragment};
