//! Test fixtures shared by unit tests

use crate::config::{IntakeConfig, RemoteSettings};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::put,
    Json, Router,
};
use std::sync::{Arc, Mutex};

/// Signing secret used by test remote settings
pub const TEST_SECRET: &str = "intake-test-signing-secret";

/// Origin the fake blob store hands out object URLs on
pub const BLOB_ORIGIN: &str = "https://blob.test";

/// `len` bytes starting with the PNG signature
#[must_use]
pub fn png_bytes(len: usize) -> Vec<u8> {
    with_signature(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], len)
}

/// `len` bytes starting with the JPEG SOI marker
#[must_use]
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    with_signature(&[0xFF, 0xD8, 0xFF, 0xE0], len)
}

/// `len` bytes starting with a GIF89a header
#[must_use]
pub fn gif_bytes(len: usize) -> Vec<u8> {
    with_signature(b"GIF89a", len)
}

fn with_signature(signature: &[u8], len: usize) -> Vec<u8> {
    let mut data = vec![0; len.max(signature.len())];
    data[..signature.len()].copy_from_slice(signature);
    data
}

/// Remote settings pointing at `api_url`
#[must_use]
pub fn test_remote_settings(api_url: &str) -> RemoteSettings {
    RemoteSettings {
        api_url: api_url.to_string(),
        token_secret: TEST_SECRET.to_string(),
        token_ttl_secs: 3600,
        callback_url: Some("http://127.0.0.1:3000/api/upload/complete".to_string()),
        public_base_url: Some(BLOB_ORIGIN.to_string()),
        path_prefix: "customers".to_string(),
        request_timeout_ms: 2_000,
    }
}

/// Default configuration writing below `root`
#[must_use]
pub fn test_config(root: &std::path::Path) -> IntakeConfig {
    let mut config = IntakeConfig::default();
    config.storage.local.root = root.to_path_buf();
    config
}

/// One `PUT` received by the fake blob store
#[derive(Debug, Clone)]
pub struct ReceivedBlob {
    /// Object path
    pub path: String,
    /// Declared content type
    pub content_type: String,
    /// Bearer token presented
    pub token: String,
    /// Body length
    pub size: usize,
}

#[derive(Clone)]
struct FakeBlobStore {
    status: StatusCode,
    received: Arc<Mutex<Vec<ReceivedBlob>>>,
}

async fn receive_blob(
    State(store): State<FakeBlobStore>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if store.status != StatusCode::OK {
        return store.status.into_response();
    }

    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let token = header_value(header::AUTHORIZATION)
        .trim_start_matches("Bearer ")
        .to_string();

    store.received.lock().unwrap().push(ReceivedBlob {
        content_type: header_value(header::CONTENT_TYPE),
        token,
        size: body.len(),
        path: path.clone(),
    });

    Json(serde_json::json!({ "url": format!("{BLOB_ORIGIN}/{path}") })).into_response()
}

/// Starts a blob store answering every `PUT` with `status`
///
/// Returns its base URL and the log of accepted uploads.
pub async fn spawn_blob_store(status: StatusCode) -> (String, Arc<Mutex<Vec<ReceivedBlob>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/{*path}", put(receive_blob))
        .with_state(FakeBlobStore {
            status,
            received: Arc::clone(&received),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), received)
}
