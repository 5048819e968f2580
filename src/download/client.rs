//! HTTP client for materializing catalog objects on disk.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::catalog::CatalogRecord;

use super::error::DownloadError;

/// Connect timeout for object downloads.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for object downloads. Generous, for large files.
const READ_TIMEOUT_SECS: u64 = 300;

/// What [`FileClient::ensure_local`] did for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The destination already held the full object; nothing was fetched.
    Skipped,
    /// The object was fetched and written to the destination.
    Downloaded,
}

/// HTTP client for downloading objects with streaming support.
///
/// Object URLs come straight from catalog records and need no signing.
/// The client is designed to be created once and reused across all
/// records, taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct FileClient {
    client: Client,
}

impl Default for FileClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FileClient {
    /// Creates a new file client with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Makes the record's object present and complete under `output_root`.
    ///
    /// The destination is derived from the object URL's path. A file
    /// already present with exactly the catalog's byte length is left
    /// untouched and no request is made; anything else (missing file,
    /// partial download from an interrupted run, stale content) triggers
    /// a fresh streaming download that overwrites the destination. The
    /// body is never buffered in memory as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on a bad URL, directory or file IO
    /// failure, non-success HTTP status, or mid-stream transport failure.
    /// A failed stream removes the partial file best-effort so the next
    /// run re-downloads instead of resuming from garbage.
    #[instrument(skip(self, record), fields(url = %record.original_file_url))]
    pub async fn ensure_local(
        &self,
        output_root: &Path,
        record: &CatalogRecord,
    ) -> Result<FileOutcome, DownloadError> {
        let url = &record.original_file_url;
        let dest = dest_path(output_root, url)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        match tokio::fs::metadata(&dest).await {
            Ok(meta) if meta.len() == record.size => {
                debug!(path = %dest.display(), size = record.size, "already complete, skipping");
                return Ok(FileOutcome::Skipped);
            }
            Ok(meta) => {
                debug!(
                    path = %dest.display(),
                    have = meta.len(),
                    want = record.size,
                    "size mismatch, re-downloading"
                );
            }
            Err(_) => {}
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let mut file = File::create(&dest)
            .await
            .map_err(|e| DownloadError::io(dest.clone(), e))?;

        let written = match stream_to_file(&mut file, response, url, &dest).await {
            Ok(written) => written,
            Err(e) => {
                debug!(path = %dest.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(e);
            }
        };

        if written != record.size {
            warn!(
                url = %url,
                expected = record.size,
                actual = written,
                "downloaded size differs from catalog size"
            );
        }

        info!(path = %dest.display(), bytes = written, "download complete");
        Ok(FileOutcome::Downloaded)
    }
}

/// Derives the local destination for an object URL.
///
/// The URL's path, leading separator stripped, becomes a relative path
/// under `output_root`; scheme and host are discarded. Path segments are
/// used verbatim, without percent-decoding, so destinations are stable
/// across runs. Paths that would escape `output_root` are rejected.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] for an unparseable URL or one
/// with an empty path, and [`DownloadError::UnsafePath`] if the path
/// contains non-normal components.
pub fn dest_path(output_root: &Path, url: &str) -> Result<PathBuf, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    let relative = parsed.path().trim_start_matches('/');
    if relative.is_empty() {
        return Err(DownloadError::invalid_url(url));
    }
    let relative = Path::new(relative);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(DownloadError::unsafe_path(url));
    }
    Ok(output_root.join(relative))
}

/// Streams the response body to a file, returning bytes written.
///
/// Extracted so the caller can clean up the partial file on error.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}
