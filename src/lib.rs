//! Uploadcare Dump Core Library
//!
//! This library mirrors an Uploadcare project to local disk in two phases:
//! a metadata phase that walks the paginated file listing into a per-project
//! NDJSON file, and a file phase that re-reads that file and fetches every
//! object it references, skipping files that are already fully downloaded.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - TOML config loading and credential validation
//! - [`signer`] - Uploadcare request signing (HMAC-SHA1 auth headers)
//! - [`api`] - Signed REST client, paginated file listing, project info
//! - [`catalog`] - Catalog records and the NDJSON metadata sink/reader
//! - [`download`] - Idempotent streaming file downloads
//! - [`dump`] - Per-project orchestration of the two phases

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod catalog;
pub mod config;
pub mod download;
pub mod dump;
pub mod signer;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, FileLister, Page, ProjectInfo};
pub use catalog::{CatalogRecord, MetaError, MetadataReader, MetadataSink};
pub use config::{Config, ConfigError, ConfigIssue, ProjectCredential};
pub use download::{
    DEFAULT_CONCURRENCY, DownloadError, EngineError, FetchEngine, FetchStats, FileClient,
    FileOutcome,
};
pub use dump::{DumpError, METADATA_FILENAME, dump_files, dump_meta};
