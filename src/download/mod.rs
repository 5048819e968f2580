//! Idempotent streaming downloads of catalog objects.
//!
//! [`FileClient`] decides per record whether a download is needed (the
//! size-equality fast path never touches the network) and streams the
//! object to its deterministic destination when it is. [`FetchEngine`]
//! runs records from a metadata file through the client with bounded
//! concurrency, counting per-record outcomes without letting one failed
//! file abort the phase.

mod client;
mod engine;
mod error;

pub use client::{FileClient, FileOutcome, dest_path};
pub use engine::{DEFAULT_CONCURRENCY, EngineError, FetchEngine, FetchStats};
pub use error::DownloadError;
