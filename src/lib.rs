//! fragfs: a chunked object store over size-limited hosting services.
//!
//! Uploads are split into fixed-size fragments and queued on a message broker;
//! an external consumer hosts each fragment and records where it went. Reads go
//! through a virtual filesystem that reassembles the fragments in order from the
//! configured backend.

pub mod api;
pub mod broker;
pub mod cadapter;
pub mod config;
pub mod domain;
pub mod error;
pub mod fragment;
pub mod ingest;
pub mod namespace;
pub mod service;
pub mod status;
pub mod utils;
pub mod vfs;
