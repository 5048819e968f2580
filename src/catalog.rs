//! Catalog records and the NDJSON metadata file.
//!
//! The metadata file is the contract boundary between the metadata phase
//! and the file phase: one JSON object per line, `\n`-terminated, in the
//! exact order records arrived from the API. A later run may read it
//! without re-running the metadata phase, so the format is append-only
//! and stable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tracing::debug;

/// One entry of the remote file catalog.
///
/// Only the two fields the dump pipeline acts on are typed; everything
/// else the API returns is carried verbatim in `extra` so the persisted
/// metadata is a full-fidelity copy of the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Absolute URL of the stored binary object.
    #[serde(rename = "originalFileUrl")]
    pub original_file_url: String,
    /// Object size in bytes, as reported by the catalog.
    pub size: u64,
    /// All remaining catalog fields, pass-through.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Errors from writing or reading the metadata file.
#[derive(Debug, Error)]
pub enum MetaError {
    /// File system error on the metadata file.
    #[error("IO error on metadata file {path}: {source}")]
    Io {
        /// The metadata file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized to JSON.
    #[error("failed to serialize catalog record: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A line of the metadata file is not a valid catalog record.
    #[error("malformed record on line {line} of {path}: {source}")]
    Parse {
        /// The metadata file path.
        path: PathBuf,
        /// One-based line number of the bad record.
        line: u64,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl MetaError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Append-only writer for a project's metadata file.
///
/// The destination is held open for the sink's lifetime. Each record is
/// serialized to a complete line before any write call, so a crash can
/// leave at most one truncated final line and never interleaves records.
/// Pre-existing content is never touched; new records land after it.
#[derive(Debug)]
pub struct MetadataSink {
    writer: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl MetadataSink {
    /// Opens `path` for appending, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Io`] if the file cannot be opened.
    pub async fn append(path: &Path) -> Result<Self, MetaError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| MetaError::io(path, e))?;
        debug!(path = %path.display(), "opened metadata sink");
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    /// Appends one record as a single NDJSON line.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Serialize`] if the record cannot be encoded
    /// and [`MetaError::Io`] if the write fails.
    pub async fn write_record(&mut self, record: &CatalogRecord) -> Result<(), MetaError> {
        let mut line =
            serde_json::to_string(record).map_err(|source| MetaError::Serialize { source })?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| MetaError::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and closes the sink, returning the record count.
    ///
    /// Call this on every exit path, including after a source failure, so
    /// records received before the failure are durable on disk.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Io`] if the flush fails.
    pub async fn finish(mut self) -> Result<u64, MetaError> {
        self.writer
            .flush()
            .await
            .map_err(|e| MetaError::io(&self.path, e))?;
        debug!(path = %self.path.display(), records = self.written, "metadata sink closed");
        Ok(self.written)
    }
}

/// Line-at-a-time reader for a project's metadata file.
///
/// Tolerates a final line without a trailing newline and skips blank
/// lines. A malformed line surfaces with its line number.
#[derive(Debug)]
pub struct MetadataReader {
    lines: Lines<BufReader<File>>,
    path: PathBuf,
    line: u64,
}

impl MetadataReader {
    /// Opens a metadata file for reading.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Io`] if the file cannot be opened.
    pub async fn open(path: &Path) -> Result<Self, MetaError> {
        let file = File::open(path).await.map_err(|e| MetaError::io(path, e))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            path: path.to_path_buf(),
            line: 0,
        })
    }

    /// Returns the next record, or `None` at end of file.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Io`] on read failure and [`MetaError::Parse`]
    /// when a line is not a valid catalog record.
    pub async fn next_record(&mut self) -> Result<Option<CatalogRecord>, MetaError> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .map_err(|e| MetaError::io(&self.path, e))?
            else {
                return Ok(None);
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line)
                .map(Some)
                .map_err(|source| MetaError::Parse {
                    path: self.path.clone(),
                    line: self.line,
                    source,
                });
        }
    }
}
