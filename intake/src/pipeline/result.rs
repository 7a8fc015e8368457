//! Outcome of a single upload

use crate::error::UploadError;
use crate::storage::StoredReference;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Stage an upload was in when it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    /// Extracting the file from the submission
    Receive,
    /// Checking type, size and filename
    Validate,
    /// Persisting to the storage backend
    Store,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Receive => "receive",
            Self::Validate => "validate",
            Self::Store => "store",
        })
    }
}

/// Either a stored reference or the error that stopped the upload
#[derive(Debug)]
pub enum UploadResult {
    /// File was persisted
    Success(StoredReference),
    /// File was not persisted
    Failure {
        /// Where the upload stopped
        stage: UploadStage,
        /// Why it stopped
        error: UploadError,
    },
}

impl UploadResult {
    /// Failure at the given stage
    #[must_use]
    pub const fn failed(stage: UploadStage, error: UploadError) -> Self {
        Self::Failure { stage, error }
    }

    /// True if a reference was produced
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The reference, if any
    #[must_use]
    pub const fn reference(&self) -> Option<&StoredReference> {
        match self {
            Self::Success(reference) => Some(reference),
            Self::Failure { .. } => None,
        }
    }

    /// Converts into a plain `Result`, dropping the stage
    ///
    /// # Errors
    ///
    /// Returns the upload error on failure.
    pub fn into_result(self) -> Result<StoredReference, UploadError> {
        match self {
            Self::Success(reference) => Ok(reference),
            Self::Failure { error, .. } => Err(error),
        }
    }
}

/// JSON body of a successful upload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBody {
    /// Reference to the stored file
    pub file_url: StoredReference,
}

impl IntoResponse for UploadResult {
    fn into_response(self) -> Response {
        match self {
            Self::Success(reference) => (StatusCode::OK, Json(SuccessBody { file_url: reference })).into_response(),
            Self::Failure { stage, error } => {
                tracing::debug!(%stage, kind = %error.kind(), "reporting upload failure");
                error.into_response()
            }
        }
    }
}
