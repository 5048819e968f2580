//! File-phase engine: bounded-concurrency downloads over a metadata file.
//!
//! The engine reads records sequentially from a [`MetadataReader`] and
//! runs each through [`FileClient::ensure_local`] in its own task, with a
//! semaphore capping how many downloads are in flight. One record's
//! failure is counted and logged, never fatal to the phase; metadata read
//! errors are fatal, since they mean the durable intermediate is broken.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{MetaError, MetadataReader};

use super::client::{FileClient, FileOutcome};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 32;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Error type for the file-phase engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Reading the metadata file failed.
    #[error(transparent)]
    Meta(#[from] MetaError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Outcome counts from one file-phase run.
///
/// Uses atomic counters so concurrent download tasks can update them.
#[derive(Debug, Default)]
pub struct FetchStats {
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl FetchStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of objects fetched and written.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Returns the number of objects already complete on disk.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns the number of objects that failed to download.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the total number of records processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded() + self.skipped() + self.failed()
    }

    /// Folds another run's counts into this tracker.
    ///
    /// Used to total stats across projects.
    pub fn merge(&self, other: &FetchStats) {
        self.downloaded
            .fetch_add(other.downloaded(), Ordering::SeqCst);
        self.skipped.fetch_add(other.skipped(), Ordering::SeqCst);
        self.failed.fetch_add(other.failed(), Ordering::SeqCst);
    }

    fn increment_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Download engine for the file phase.
///
/// # Concurrency Model
///
/// - Records are read from the metadata file strictly in order
/// - Each download runs in its own Tokio task
/// - A semaphore permit is acquired before starting each download
/// - Permits are released automatically when downloads complete (RAII)
///
/// `--concurrency 1` serializes downloads completely: each file finishes
/// before the next record's task can start.
#[derive(Debug)]
pub struct FetchEngine {
    /// Semaphore for concurrency control.
    semaphore: Arc<Semaphore>,
    /// Configured concurrency limit.
    concurrency: usize,
}

impl FetchEngine {
    /// Creates a new engine with the specified concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-32).
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating fetch engine");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs every record in the metadata file through the downloader.
    ///
    /// # Returns
    ///
    /// Counts of downloaded, skipped, and failed records. A positive
    /// failed count is not an error from this method; callers decide how
    /// to report it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Meta`] if the metadata file cannot be read
    /// or contains a malformed record, and [`EngineError::SemaphoreClosed`]
    /// if the semaphore is closed. Individual download failures are
    /// counted, not returned.
    #[instrument(skip(self, reader, client), fields(output_root = %output_root.display()))]
    pub async fn fetch_all(
        &self,
        reader: &mut MetadataReader,
        client: &FileClient,
        output_root: &Path,
    ) -> Result<FetchStats, EngineError> {
        let stats = Arc::new(FetchStats::new());
        let mut handles = Vec::new();

        while let Some(record) = reader.next_record().await? {
            // Blocks while the pool is full, so reading stays bounded too.
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            let client = client.clone();
            let stats = Arc::clone(&stats);
            let output_root = output_root.to_path_buf();

            handles.push(tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;

                info!(url = %record.original_file_url, "processing file");
                match client.ensure_local(&output_root, &record).await {
                    Ok(FileOutcome::Downloaded) => stats.increment_downloaded(),
                    Ok(FileOutcome::Skipped) => stats.increment_skipped(),
                    Err(e) => {
                        warn!(
                            url = %record.original_file_url,
                            error = %e,
                            "file download failed"
                        );
                        stats.increment_failed();
                    }
                }
            }));
        }

        for handle in handles {
            // Ignore JoinError - task panics are logged but don't fail the run
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
            }
        }

        info!(
            downloaded = stats.downloaded(),
            skipped = stats.skipped(),
            failed = stats.failed(),
            total = stats.total(),
            "file phase complete"
        );

        match Arc::try_unwrap(stats) {
            Ok(stats) => Ok(stats),
            Err(arc_stats) => {
                // All tasks are joined, so this shouldn't happen; rebuild
                // from the atomic values rather than assuming.
                let new_stats = FetchStats::new();
                new_stats
                    .downloaded
                    .store(arc_stats.downloaded(), Ordering::SeqCst);
                new_stats
                    .skipped
                    .store(arc_stats.skipped(), Ordering::SeqCst);
                new_stats
                    .failed
                    .store(arc_stats.failed(), Ordering::SeqCst);
                Ok(new_stats)
            }
        }
    }
}
