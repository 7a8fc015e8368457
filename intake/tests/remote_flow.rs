//! Integration tests for the remote blob store backend
//!
//! A small in-process blob store accepts `PUT`s so that both server-side
//! uploads and the client token round trip can be exercised end to end.

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    routing::put,
    Json, Router,
};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use intake::config::{IntakeConfig, StorageBackend};
use intake::server::router;
use intake::state::IntakeState;
use serde_json::{json, Value};

const SECRET: &str = "integration-test-signing-secret";
const BLOB_ORIGIN: &str = "https://blob.test";

async fn fake_blob_put(Path(path): Path<String>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>, StatusCode> {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    if !authorized || body.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({ "url": format!("{BLOB_ORIGIN}/{path}") })))
}

async fn spawn_blob_store() -> String {
    let app = Router::new().route("/{*path}", put(fake_blob_put));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn remote_config(api_url: &str) -> IntakeConfig {
    let mut config = IntakeConfig::default();
    config.storage.backend = StorageBackend::Remote;
    config.storage.remote.api_url = api_url.to_string();
    config.storage.remote.token_secret = SECRET.to_string();
    config.storage.remote.public_base_url = Some(BLOB_ORIGIN.to_string());
    config.storage.remote.request_timeout_ms = 2_000;
    config
}

async fn remote_server() -> TestServer {
    let api_url = spawn_blob_store().await;
    let state = IntakeState::from_config(remote_config(&api_url)).unwrap();
    TestServer::new(router(state)).unwrap()
}

async fn request_token(server: &TestServer, pathname: &str) -> Value {
    let response = server
        .post("/api/upload/token")
        .json(&json!({ "pathname": pathname, "contentType": "image/png", "clientPayload": "customer-7" }))
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_server_side_upload_to_blob_store() {
    let server = remote_server().await;
    let mut data = vec![0; 2048];
    data[..4].copy_from_slice(&[0x89, 0x50, 0x4E, 0x47]);

    let response = server
        .post("/api/upload")
        .multipart(MultipartForm::new().add_part("file", Part::bytes(data).file_name("avatar.png").mime_type("image/png")))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let file_url = body["fileUrl"].as_str().unwrap();
    assert!(file_url.starts_with(&format!("{BLOB_ORIGIN}/customers/avatar-")), "{file_url}");
    assert!(file_url.ends_with(".png"));
}

#[tokio::test]
async fn test_health_reports_remote() {
    let server = remote_server().await;
    server
        .get("/health")
        .await
        .assert_json(&json!({ "status": "ok", "backend": "remote" }));
}

#[tokio::test]
async fn test_token_round_trip() {
    let server = remote_server().await;
    let token = request_token(&server, "Profile Photo.png").await;

    let pathname = token["pathname"].as_str().unwrap();
    assert!(pathname.starts_with("customers/Profile-Photo-"), "{pathname}");
    assert!(token["uploadUrl"].as_str().unwrap().ends_with(pathname));
    assert!(token["expiresAt"].is_string());

    let blob_url = format!("{BLOB_ORIGIN}/{pathname}");
    let response = server
        .post("/api/upload/complete")
        .json(&json!({
            "blob": { "url": blob_url, "pathname": pathname, "contentType": "image/png" },
            "tokenPayload": token["clientToken"],
        }))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({ "fileUrl": blob_url }));
}

#[tokio::test]
async fn test_token_rejects_disallowed_type() {
    let server = remote_server().await;

    let response = server
        .post("/api/upload/token")
        .json(&json!({ "pathname": "payload.svg", "contentType": "image/svg+xml" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("image/svg+xml"));
}

#[tokio::test]
async fn test_malformed_token_request() {
    let server = remote_server().await;

    let response = server
        .post("/api/upload/token")
        .json(&json!({ "contentType": "image/png" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_tampered_token_rejected() {
    let server = remote_server().await;
    let token = request_token(&server, "avatar.png").await;
    let pathname = token["pathname"].as_str().unwrap();

    // Swap the first character of the signature segment
    let client_token = token["clientToken"].as_str().unwrap();
    let (signed, signature) = client_token.rsplit_once('.').unwrap();
    let mut chars = signature.chars();
    let first = chars.next().unwrap();
    let tampered = format!("{signed}.{}{}", if first == 'a' { 'b' } else { 'a' }, chars.as_str());

    let response = server
        .post("/api/upload/complete")
        .json(&json!({
            "blob": { "url": format!("{BLOB_ORIGIN}/{pathname}") },
            "tokenPayload": tampered,
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "Invalid or expired upload token." }));
}

#[tokio::test]
async fn test_completion_for_other_object_rejected() {
    let server = remote_server().await;
    let token = request_token(&server, "avatar.png").await;

    let response = server
        .post("/api/upload/complete")
        .json(&json!({
            "blob": { "url": format!("{BLOB_ORIGIN}/customers/someone-else.png") },
            "tokenPayload": token["clientToken"],
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "Invalid or expired upload token." }));
}

async fn complete(server: &TestServer, url: &str, token: &Value) -> TestResponse {
    server
        .post("/api/upload/complete")
        .json(&json!({ "blob": { "url": url }, "tokenPayload": token["clientToken"] }))
        .await
}

#[tokio::test]
async fn test_completion_on_foreign_host_rejected() {
    let server = remote_server().await;
    let token = request_token(&server, "a.png").await;
    let pathname = token["pathname"].as_str().unwrap();

    let response = complete(&server, &format!("https://evil.attacker.net/{pathname}"), &token).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "Invalid or expired upload token." }));

    // The token is still usable for the genuine object
    complete(&server, &format!("{BLOB_ORIGIN}/{pathname}"), &token)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_completion_with_scheme_mismatch_rejected() {
    let server = remote_server().await;
    let token = request_token(&server, "a.png").await;
    let pathname = token["pathname"].as_str().unwrap();

    let response = complete(&server, &format!("http://blob.test/{pathname}"), &token).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "Invalid or expired upload token." }));
}

#[tokio::test]
async fn test_completion_is_accepted_once() {
    let server = remote_server().await;
    let token = request_token(&server, "a.png").await;
    let blob_url = format!("{BLOB_ORIGIN}/{}", token["pathname"].as_str().unwrap());

    let first = complete(&server, &blob_url, &token).await;
    first.assert_status_ok();
    first.assert_json(&json!({ "fileUrl": blob_url }));

    let replay = complete(&server, &blob_url, &token).await;
    replay.assert_status(StatusCode::BAD_REQUEST);
    replay.assert_json(&json!({ "error": "Invalid or expired upload token." }));
}
