//! Per-project orchestration of the two dump phases.
//!
//! The metadata phase runs fetcher → sink to completion; the file phase
//! later re-reads the sink's output and feeds it through the download
//! engine. The phases are decoupled through the on-disk metadata file,
//! so the file phase can be re-run on its own (e.g. after a crash)
//! without re-listing the catalog.

use std::path::{Path, PathBuf};
use std::pin::pin;

use futures_util::TryStreamExt;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, ApiError};
use crate::catalog::{MetaError, MetadataReader, MetadataSink};
use crate::download::{EngineError, FetchEngine, FetchStats, FileClient};

/// Name of the per-project metadata file.
pub const METADATA_FILENAME: &str = "meta.ndjson";

/// Errors from running a dump phase for one project.
#[derive(Debug, Error)]
pub enum DumpError {
    /// The API listing or project-info call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The metadata file could not be written or read.
    #[error(transparent)]
    Meta(#[from] MetaError),

    /// The file-phase engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Project directory setup failed.
    #[error("failed to create project directory {path}: {source}")]
    Io {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Runs the metadata phase for one project.
///
/// Creates the project directory under `output_root` (tolerating an
/// existing one) and appends every catalog record to its metadata file in
/// arrival order. Returns the number of records fetched.
///
/// Any listing failure aborts the phase, but records received before the
/// failure are flushed to disk first, so a later `files` run can still
/// act on them.
///
/// # Errors
///
/// Returns [`DumpError::Io`] if the project directory cannot be created,
/// [`DumpError::Meta`] on sink failures, and [`DumpError::Api`] when the
/// listing aborts.
#[instrument(skip(api), fields(project = %api.project_name()))]
pub async fn dump_meta(api: &ApiClient, output_root: &Path) -> Result<u64, DumpError> {
    let project_dir = output_root.join(api.project_name());
    tokio::fs::create_dir_all(&project_dir)
        .await
        .map_err(|source| DumpError::Io {
            path: project_dir.clone(),
            source,
        })?;

    let meta_path = project_dir.join(METADATA_FILENAME);
    info!(path = %meta_path.display(), "fetching metadata");

    let mut sink = MetadataSink::append(&meta_path).await?;
    let mut records = pin!(api.list_files().records());

    loop {
        match records.try_next().await {
            Ok(Some(record)) => sink.write_record(&record).await?,
            Ok(None) => break,
            Err(e) => {
                // Keep what we got: flush before surfacing the fetch error.
                if let Err(flush_err) = sink.finish().await {
                    warn!(error = %flush_err, "failed to flush metadata sink");
                }
                return Err(e.into());
            }
        }
    }

    let count = sink.finish().await?;
    info!(records = count, "metadata phase complete");
    Ok(count)
}

/// Runs the file phase for one project.
///
/// Re-reads the project's metadata file and makes every referenced object
/// present and complete under the project directory. Individual download
/// failures are counted in the returned stats, not returned as errors.
///
/// # Errors
///
/// Returns [`DumpError::Meta`] if the metadata file is missing or
/// unreadable and [`DumpError::Engine`] on engine failures.
#[instrument(skip(engine, client, output_root))]
pub async fn dump_files(
    project: &str,
    output_root: &Path,
    engine: &FetchEngine,
    client: &FileClient,
) -> Result<FetchStats, DumpError> {
    let project_dir = output_root.join(project);
    let meta_path = project_dir.join(METADATA_FILENAME);
    info!(path = %meta_path.display(), "fetching files");

    let mut reader = MetadataReader::open(&meta_path).await?;
    let stats = engine.fetch_all(&mut reader, client, &project_dir).await?;
    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ProjectCredential;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn demo_credential() -> ProjectCredential {
        ProjectCredential {
            name: "demo".to_string(),
            public_key: "demopublickey".to_string(),
            secret_key: "demosecretkey".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dump_meta_writes_records_and_returns_count() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/files/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "next": null,
                "results": [
                    {"originalFileUrl": "https://h/a.bin", "size": 3},
                    {"originalFileUrl": "https://h/b.bin", "size": 0}
                ]
            })))
            .mount(&mock_server)
            .await;

        let api = ApiClient::with_base_url(demo_credential(), mock_server.uri());
        let count = dump_meta(&api, temp_dir.path()).await.unwrap();
        assert_eq!(count, 2);

        let text =
            std::fs::read_to_string(temp_dir.path().join("demo").join(METADATA_FILENAME)).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_dump_meta_tolerates_existing_project_dir() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("demo")).unwrap();

        Mock::given(method("GET"))
            .and(path("/files/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "next": null,
                "results": []
            })))
            .mount(&mock_server)
            .await;

        let api = ApiClient::with_base_url(demo_credential(), mock_server.uri());
        let count = dump_meta(&api, temp_dir.path()).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_dump_meta_flushes_earlier_pages_when_listing_fails() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let second_url = format!("{}/files/?limit=100&cursor=page2", mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/files/"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "next": second_url,
                "results": [{"originalFileUrl": "https://h/a.bin", "size": 3}]
            })))
            .with_priority(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/files/"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(503))
            .with_priority(1)
            .mount(&mock_server)
            .await;

        let api = ApiClient::with_base_url(demo_credential(), mock_server.uri());
        let result = dump_meta(&api, temp_dir.path()).await;
        assert!(matches!(
            result,
            Err(DumpError::Api(ApiError::Status { status: 503, .. }))
        ));

        // The first page's record survived the abort.
        let text =
            std::fs::read_to_string(temp_dir.path().join("demo").join(METADATA_FILENAME)).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("a.bin"));
    }

    #[tokio::test]
    async fn test_dump_files_missing_metadata_is_meta_error() {
        let temp_dir = TempDir::new().unwrap();
        let engine = FetchEngine::new(1).unwrap();
        let client = FileClient::new();

        let result = dump_files("demo", temp_dir.path(), &engine, &client).await;
        assert!(matches!(result, Err(DumpError::Meta(MetaError::Io { .. }))));
    }
}
