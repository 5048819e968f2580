//! Integration tests for the full dump pipeline.
//!
//! These drive the metadata and file phases end-to-end against mock HTTP
//! servers: a signed listing API on one server and plain object downloads
//! on the same one, the way real records point at the CDN.

use std::path::Path;

use tempfile::TempDir;
use uploadcare_dump::{
    ApiClient, CatalogRecord, DumpError, FetchEngine, FileClient, METADATA_FILENAME,
    ProjectCredential, dump_files, dump_meta,
};
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn demo_credential() -> ProjectCredential {
    ProjectCredential {
        name: "demo".to_string(),
        public_key: "demopublickey".to_string(),
        secret_key: "demosecretkey".to_string(),
    }
}

fn meta_path(output_root: &Path) -> std::path::PathBuf {
    output_root.join("demo").join(METADATA_FILENAME)
}

/// Mounts a two-page listing plus the two objects it references:
/// `a.bin` (3 bytes) on page one, `b.bin` (0 bytes) on page two.
async fn mount_two_page_catalog(mock_server: &MockServer) {
    let second_url = format!("{}/files/?limit=100&cursor=page2", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/files/"))
        .and(query_param("limit", "100"))
        .and(header_exists("Authorization"))
        .and(header_exists("Date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "next": second_url,
            "results": [{
                "uuid": "aaaa-1111",
                "originalFileUrl": format!("{}/a.bin", mock_server.uri()),
                "size": 3
            }]
        })))
        .with_priority(2)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/"))
        .and(query_param("cursor", "page2"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "next": null,
            "results": [{
                "uuid": "bbbb-2222",
                "originalFileUrl": format!("{}/b.bin", mock_server.uri()),
                "size": 0
            }]
        })))
        .with_priority(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc"))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b""))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_two_page_catalog_dumps_meta_then_files() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    mount_two_page_catalog(&mock_server).await;

    // Metadata phase: exactly two lines, in server order.
    let api = ApiClient::with_base_url(demo_credential(), mock_server.uri());
    let count = dump_meta(&api, temp_dir.path()).await.expect("meta phase");
    assert_eq!(count, 2);

    let text = std::fs::read_to_string(meta_path(temp_dir.path())).expect("read meta");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2, "expected two NDJSON lines: {text}");

    let first: CatalogRecord = serde_json::from_str(lines[0]).expect("line 1 JSON");
    assert!(first.original_file_url.ends_with("/a.bin"));
    assert_eq!(first.size, 3);
    assert_eq!(first.extra.get("uuid").unwrap(), &serde_json::json!("aaaa-1111"));

    let second: CatalogRecord = serde_json::from_str(lines[1]).expect("line 2 JSON");
    assert!(second.original_file_url.ends_with("/b.bin"));
    assert_eq!(second.size, 0);

    // File phase: both objects materialized under the project directory.
    let engine = FetchEngine::new(2).expect("engine");
    let client = FileClient::new();
    let stats = dump_files("demo", temp_dir.path(), &engine, &client)
        .await
        .expect("file phase");

    assert_eq!(stats.downloaded(), 2);
    assert_eq!(stats.skipped(), 0);
    assert_eq!(stats.failed(), 0);

    let a = temp_dir.path().join("demo/a.bin");
    let b = temp_dir.path().join("demo/b.bin");
    assert_eq!(std::fs::read(&a).expect("a.bin"), b"abc");
    assert_eq!(std::fs::metadata(&b).expect("b.bin").len(), 0);
}

#[tokio::test]
async fn test_file_phase_rerun_skips_complete_files() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    mount_two_page_catalog(&mock_server).await;

    let api = ApiClient::with_base_url(demo_credential(), mock_server.uri());
    dump_meta(&api, temp_dir.path()).await.expect("meta phase");

    let engine = FetchEngine::new(1).expect("engine");
    let client = FileClient::new();

    let first_run = dump_files("demo", temp_dir.path(), &engine, &client)
        .await
        .expect("first file phase");
    assert_eq!(first_run.downloaded(), 2);

    let second_run = dump_files("demo", temp_dir.path(), &engine, &client)
        .await
        .expect("second file phase");
    assert_eq!(second_run.downloaded(), 0);
    assert_eq!(second_run.skipped(), 2);
    assert_eq!(second_run.failed(), 0);
}

#[tokio::test]
async fn test_file_phase_resumes_truncated_download() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    mount_two_page_catalog(&mock_server).await;

    let api = ApiClient::with_base_url(demo_credential(), mock_server.uri());
    dump_meta(&api, temp_dir.path()).await.expect("meta phase");

    // Simulate an interrupted prior run: a.bin exists but is short.
    std::fs::create_dir_all(temp_dir.path().join("demo")).expect("mkdir");
    std::fs::write(temp_dir.path().join("demo/a.bin"), b"a").expect("truncated file");

    let engine = FetchEngine::new(1).expect("engine");
    let client = FileClient::new();
    let stats = dump_files("demo", temp_dir.path(), &engine, &client)
        .await
        .expect("file phase");

    assert_eq!(stats.downloaded(), 2);
    assert_eq!(
        std::fs::read(temp_dir.path().join("demo/a.bin")).expect("a.bin"),
        b"abc"
    );
}

#[tokio::test]
async fn test_file_phase_counts_failures_and_continues() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/files/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "next": null,
            "results": [
                {"originalFileUrl": format!("{}/gone.bin", mock_server.uri()), "size": 4},
                {"originalFileUrl": format!("{}/ok.bin", mock_server.uri()), "size": 2}
            ]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gone.bin"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ok.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok"))
        .mount(&mock_server)
        .await;

    let api = ApiClient::with_base_url(demo_credential(), mock_server.uri());
    dump_meta(&api, temp_dir.path()).await.expect("meta phase");

    let engine = FetchEngine::new(1).expect("engine");
    let client = FileClient::new();
    let stats = dump_files("demo", temp_dir.path(), &engine, &client)
        .await
        .expect("file phase should not abort on a per-record failure");

    assert_eq!(stats.failed(), 1);
    assert_eq!(stats.downloaded(), 1);
    assert_eq!(
        std::fs::read(temp_dir.path().join("demo/ok.bin")).expect("ok.bin"),
        b"ok"
    );
}

#[tokio::test]
async fn test_empty_catalog_yields_empty_metadata_and_no_files() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/files/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "next": null,
            "results": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = ApiClient::with_base_url(demo_credential(), mock_server.uri());
    let count = dump_meta(&api, temp_dir.path()).await.expect("meta phase");
    assert_eq!(count, 0);

    let text = std::fs::read_to_string(meta_path(temp_dir.path())).expect("read meta");
    assert!(text.is_empty());

    let engine = FetchEngine::new(1).expect("engine");
    let client = FileClient::new();
    let stats = dump_files("demo", temp_dir.path(), &engine, &client)
        .await
        .expect("file phase");
    assert_eq!(stats.total(), 0);
}

#[tokio::test]
async fn test_metadata_phase_abort_is_attributable_and_durable() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let second_url = format!("{}/files/?limit=100&cursor=page2", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/files/"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "next": second_url,
            "results": [{"originalFileUrl": format!("{}/a.bin", mock_server.uri()), "size": 3}]
        })))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&mock_server)
        .await;

    let api = ApiClient::with_base_url(demo_credential(), mock_server.uri());
    let result = dump_meta(&api, temp_dir.path()).await;
    assert!(matches!(result, Err(DumpError::Api(_))), "got: {result:?}");

    // Records from the successful page are on disk; a later `files` run
    // can act on them without re-listing.
    let text = std::fs::read_to_string(meta_path(temp_dir.path())).expect("read meta");
    assert_eq!(text.lines().count(), 1);
}
