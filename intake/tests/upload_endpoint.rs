//! Integration tests for the upload endpoint
//!
//! Drives `POST /api/upload` through the full router with the local disk
//! backend and checks response bodies and what ends up on disk.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use intake::config::IntakeConfig;
use intake::server::router;
use intake::state::IntakeState;
use intake::storage::{StorageError, StorageResult, StorageWriter, StoredReference, ValidatedFile};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a server writing below a fresh temp dir
fn test_server() -> (TestServer, TempDir) {
    let temp = TempDir::new().unwrap();
    let mut config = IntakeConfig::default();
    config.storage.local.root = temp.path().to_path_buf();

    let state = IntakeState::from_config(config).unwrap();
    (TestServer::new(router(state)).unwrap(), temp)
}

fn png(len: usize) -> Vec<u8> {
    let mut data = vec![0; len];
    data[..8].copy_from_slice(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    data
}

fn file_form(filename: &str, mime: &str, data: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(data).file_name(filename).mime_type(mime))
}

fn stored_files(root: &Path) -> Vec<String> {
    std::fs::read_dir(root.join("customers"))
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_png_upload_returns_file_url() {
    let (server, temp) = test_server();

    let response = server
        .post("/api/upload")
        .multipart(file_form("avatar.png", "image/png", png(2048)))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let file_url = body["fileUrl"].as_str().unwrap();
    assert!(file_url.starts_with("/customers/avatar-"), "{file_url}");
    assert!(file_url.ends_with(".png"), "{file_url}");

    let files = stored_files(temp.path());
    assert_eq!(files.len(), 1);
    assert_eq!(format!("/customers/{}", files[0]), file_url);
    assert_eq!(
        std::fs::read(temp.path().join("customers").join(&files[0])).unwrap().len(),
        2048
    );
}

#[tokio::test]
async fn test_missing_file_field() {
    let (server, temp) = test_server();

    let response = server
        .post("/api/upload")
        .multipart(MultipartForm::new().add_text("name", "Evil Rabbit"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "File blob is required." }));
    assert!(stored_files(temp.path()).is_empty());
}

#[tokio::test]
async fn test_empty_file_part() {
    let (server, temp) = test_server();

    // What a browser submits when no file was picked
    let response = server
        .post("/api/upload")
        .multipart(file_form("", "application/octet-stream", Vec::new()))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "File blob is required." }));
    assert!(stored_files(temp.path()).is_empty());
}

#[tokio::test]
async fn test_non_multipart_body() {
    let (server, _temp) = test_server();

    let response = server.post("/api/upload").json(&json!({ "file": "avatar.png" })).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "File blob is required." }));
}

#[tokio::test]
async fn test_oversized_jpeg_rejected() {
    let (server, temp) = test_server();
    let mut data = vec![0; 15 * 1024 * 1024];
    data[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);

    let response = server
        .post("/api/upload")
        .multipart(file_form("holiday.jpg", "image/jpeg", data))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("maximum upload size"));
    assert!(stored_files(temp.path()).is_empty());
}

#[tokio::test]
async fn test_body_over_request_limit_rejected() {
    let (server, temp) = test_server();

    let response = server
        .post("/api/upload")
        .multipart(file_form("huge.png", "image/png", png(40 * 1024 * 1024)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(stored_files(temp.path()).is_empty());
}

#[tokio::test]
async fn test_body_over_request_limit_fails_as_too_large_before_type() {
    let (server, temp) = test_server();

    let response = server
        .post("/api/upload")
        .multipart(file_form("report.pdf", "application/pdf", vec![0; 40 * 1024 * 1024]))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("maximum upload size"));
    assert!(stored_files(temp.path()).is_empty());
}

#[tokio::test]
async fn test_unsupported_type_leaves_directory_empty() {
    let (server, temp) = test_server();

    let response = server
        .post("/api/upload")
        .multipart(file_form("invoice.pdf", "application/pdf", b"%PDF-1.7".to_vec()))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("application/pdf"));
    assert!(stored_files(temp.path()).is_empty());
}

#[tokio::test]
async fn test_same_name_twice_gets_distinct_urls() {
    let (server, temp) = test_server();

    let first: Value = server
        .post("/api/upload")
        .multipart(file_form("avatar.png", "image/png", png(64)))
        .await
        .json();
    let second: Value = server
        .post("/api/upload")
        .multipart(file_form("avatar.png", "image/png", png(64)))
        .await
        .json();

    assert_ne!(first["fileUrl"], second["fileUrl"]);
    assert_eq!(stored_files(temp.path()).len(), 2);
}

#[tokio::test]
async fn test_path_in_filename_is_discarded() {
    let (server, temp) = test_server();

    let response = server
        .post("/api/upload")
        .multipart(file_form("../../etc/cron.d/job.gif", "image/gif", b"GIF89a....".to_vec()))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let file_url = body["fileUrl"].as_str().unwrap();
    assert!(file_url.starts_with("/customers/job-"), "{file_url}");
    assert!(file_url.ends_with(".gif"));
    assert_eq!(stored_files(temp.path()).len(), 1);
    assert!(!temp.path().join("etc").exists());
}

struct FailingWriter;

#[async_trait]
impl StorageWriter for FailingWriter {
    async fn put(&self, _file: ValidatedFile) -> StorageResult<StoredReference> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "/srv/public/customers: permission denied",
        )))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_storage_failure_is_generic() {
    let state = IntakeState::with_writer(IntakeConfig::default(), Arc::new(FailingWriter));
    let server = TestServer::new(router(state)).unwrap();

    let response = server
        .post("/api/upload")
        .multipart(file_form("avatar.png", "image/png", png(2048)))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({ "error": "Something went wrong." }));
}

#[tokio::test]
async fn test_unwritable_directory_is_generic() {
    let (server, temp) = test_server();
    // A file where the upload directory should be
    std::fs::write(temp.path().join("customers"), b"in the way").unwrap();

    let response = server
        .post("/api/upload")
        .multipart(file_form("avatar.png", "image/png", png(2048)))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({ "error": "Something went wrong." }));
}

#[tokio::test]
async fn test_token_endpoints_need_remote_backend() {
    let (server, _temp) = test_server();

    let response = server
        .post("/api/upload/token")
        .json(&json!({ "pathname": "avatar.png", "contentType": "image/png" }))
        .await;
    response.assert_status_not_found();
    response.assert_json(&json!({ "error": "Remote uploads are not configured." }));

    server
        .post("/api/upload/complete")
        .json(&json!({ "blob": { "url": "https://blob.example.com/a.png" }, "tokenPayload": "x" }))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_health_reports_backend() {
    let (server, _temp) = test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok", "backend": "local" }));
}
