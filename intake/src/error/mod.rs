//! Error types and HTTP error reporting

use crate::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Message returned for infrastructure failures
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong.";

/// Message returned for rejected remote upload tokens
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired upload token.";

/// Everything that can stop an upload from producing a reference
#[derive(Debug, Error)]
pub enum UploadError {
    /// The designated file field is absent, empty, or not a file
    #[error("File blob is required.")]
    MissingFile,

    /// Declared (or detected) content type is not allowed
    #[error("Unsupported file type {actual}. Allowed types: {}.", .allowed.join(", "))]
    UnsupportedType {
        /// Content type that was rejected
        actual: String,
        /// Configured allow-list
        allowed: Vec<String>,
    },

    /// File is larger than the configured maximum
    #[error("File exceeds the maximum upload size of {limit} bytes.")]
    PayloadTooLarge {
        /// Bytes received (a lower bound when the request body limit tripped)
        actual: u64,
        /// Configured maximum
        limit: u64,
    },

    /// Original filename has no usable base name
    #[error("Invalid file name: {0:?}.")]
    InvalidFilename(String),

    /// Storage backend failed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),

    /// Remote upload token failed verification
    #[error("Invalid upload token: {0}")]
    TokenInvalid(String),
}

/// Discriminant of [`UploadError`], stable for logs and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`UploadError::MissingFile`]
    MissingFile,
    /// See [`UploadError::UnsupportedType`]
    UnsupportedType,
    /// See [`UploadError::PayloadTooLarge`]
    PayloadTooLarge,
    /// See [`UploadError::InvalidFilename`]
    InvalidFilename,
    /// See [`UploadError::StorageUnavailable`]
    StorageUnavailable,
    /// See [`UploadError::TokenInvalid`]
    TokenInvalid,
}

impl ErrorKind {
    /// Snake-case name of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingFile => "missing_file",
            Self::UnsupportedType => "unsupported_type",
            Self::PayloadTooLarge => "payload_too_large",
            Self::InvalidFilename => "invalid_filename",
            Self::StorageUnavailable => "storage_unavailable",
            Self::TokenInvalid => "token_invalid",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UploadError {
    /// Kind of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingFile => ErrorKind::MissingFile,
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::InvalidFilename(_) => ErrorKind::InvalidFilename,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::TokenInvalid(_) => ErrorKind::TokenInvalid,
        }
    }

    /// True for failures caused by the submission itself
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::StorageUnavailable(_) | Self::TokenInvalid(_))
    }

    /// HTTP status reported to the caller
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to the caller
    ///
    /// Infrastructure failures never expose paths, hosts or causes.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::StorageUnavailable(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            Self::TokenInvalid(_) => INVALID_TOKEN_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidPath(name) => Self::InvalidFilename(name),
            other => Self::StorageUnavailable(other),
        }
    }
}

/// JSON body of every failed response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if self.is_client_error() {
            tracing::info!(kind = %kind, reason = %self, "upload rejected");
        } else {
            tracing::error!(kind = %kind, error = %self, source = ?std::error::Error::source(&self), "upload failed");
        }

        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
