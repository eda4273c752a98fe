//! Fragment backend adapter (cAdapter)
//!
//! Submodules:
//! - `client`: the `FragmentBackend` trait and the `FragmentClient` read path
//! - `cdn`: public CDN attachments fetched over HTTP
//! - `s3`: S3-compatible bucket mirror
//! - `localfs`: local directory, for development and tests
//!
pub mod cdn;
pub mod client;
pub mod localfs;
pub mod s3;

pub use client::{BackendError, FragmentBackend, FragmentClient};
