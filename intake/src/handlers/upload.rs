//! Upload HTTP handlers
//!
//! ```text
//! POST /api/upload            multipart form, field `file`
//! POST /api/upload/token      JSON TokenRequest -> IssuedToken
//! POST /api/upload/complete   JSON CompletionEvent -> { "fileUrl" }
//! GET  /health                { "status": "ok", "backend": "local" }
//! ```

use crate::error::{ErrorBody, UploadError};
use crate::extractors::FileUpload;
use crate::pipeline::{UploadPipeline, UploadResult, UploadStage};
use crate::state::IntakeState;
use crate::storage::{CompletionEvent, IssuedToken, TokenRequest};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message returned by the token endpoints when remote uploads are off
pub const REMOTE_DISABLED_MESSAGE: &str = "Remote uploads are not configured.";

/// Response for the health endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests
    pub status: String,
    /// Active storage backend
    pub backend: String,
}

/// Accept one uploaded file
///
/// Receive, validate, store, report. Failures at any stage are reported
/// with the JSON error body and nothing is stored.
///
/// # Example
///
/// ```bash
/// curl -F "file=@avatar.png;type=image/png" http://127.0.0.1:3000/api/upload
/// ```
///
/// Response:
/// ```json
/// { "fileUrl": "/customers/avatar-1718000000000-1a2b3c4d.png" }
/// ```
pub async fn upload(
    State(pipeline): State<Arc<UploadPipeline>>,
    upload: Result<FileUpload, UploadError>,
) -> UploadResult {
    match upload {
        Ok(FileUpload(request)) => pipeline.ingest(request).await,
        Err(error) => UploadResult::failed(UploadStage::Receive, error),
    }
}

/// Issue a client upload token for the remote blob store
///
/// # Errors
///
/// - 404 when the remote backend is not active
/// - 400 when the body is malformed or the file type/name is rejected
pub async fn issue_token(
    State(state): State<IntakeState>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<IssuedToken>, Response> {
    let Some(remote) = state.remote() else {
        return Err(remote_disabled());
    };
    let Json(request) = body.map_err(bad_json)?;

    remote
        .issue_token(&request)
        .map(Json)
        .map_err(IntoResponse::into_response)
}

/// Receive the blob store's completion callback
///
/// Responds with the same `{ "fileUrl" }` body as a direct upload.
///
/// # Errors
///
/// - 404 when the remote backend is not active
/// - 400 when the body is malformed or the token does not verify
pub async fn complete_upload(
    State(state): State<IntakeState>,
    body: Result<Json<CompletionEvent>, JsonRejection>,
) -> Result<UploadResult, Response> {
    let Some(remote) = state.remote() else {
        return Err(remote_disabled());
    };
    let Json(event) = body.map_err(bad_json)?;

    Ok(match remote.complete(&event) {
        Ok(reference) => UploadResult::Success(reference),
        Err(error) => UploadResult::failed(UploadStage::Validate, error),
    })
}

/// Liveness probe reporting the active backend
pub async fn health(State(pipeline): State<Arc<UploadPipeline>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: pipeline.backend().to_string(),
    })
}

fn remote_disabled() -> Response {
    tracing::debug!("remote upload endpoint called without remote backend");
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: REMOTE_DISABLED_MESSAGE.to_string(),
        }),
    )
        .into_response()
}

fn bad_json(rejection: JsonRejection) -> Response {
    tracing::info!(%rejection, "malformed JSON body");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: rejection.body_text(),
        }),
    )
        .into_response()
}
