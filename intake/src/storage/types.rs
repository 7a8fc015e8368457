//! Core types for upload ingestion and storage

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default multipart field carrying the upload
pub const DEFAULT_FIELD_NAME: &str = "file";

/// Content type assumed when a multipart part does not declare one
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during a storage operation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Filename or directory that cannot be used as a storage location
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Remote blob store rejected the request or could not be reached
    #[error("Remote blob store error: {0}")]
    Remote(String),

    /// Generic storage error
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A file extracted from a multipart submission, not yet validated
///
/// `size()` reports every byte the client sent for the part, even when the
/// receiver stopped buffering an oversized part early, so that size checks
/// stay accurate without holding the whole payload in memory.
///
/// # Examples
///
/// ```rust
/// use intake::storage::UploadRequest;
///
/// let request = UploadRequest::new("avatar.png", "image/png", vec![0x89, 0x50, 0x4E, 0x47]);
/// assert_eq!(request.size(), 4);
/// assert_eq!(request.field_name, "file");
/// ```
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Name of the multipart field the file came from
    pub field_name: String,

    /// Original filename as sent by the browser
    pub filename: String,

    /// Browser-declared content type
    pub content_type: String,

    /// Buffered file content
    pub data: Bytes,

    observed_len: u64,
}

impl UploadRequest {
    /// Creates a request for the default `file` field
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            field_name: DEFAULT_FIELD_NAME.to_string(),
            filename: filename.into(),
            content_type: content_type.into(),
            observed_len: data.len() as u64,
            data,
        }
    }

    /// Sets the multipart field name
    #[must_use]
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Records the total number of bytes received for the part
    ///
    /// Never lower than the buffered length.
    #[must_use]
    pub fn with_observed_len(mut self, observed_len: u64) -> Self {
        self.observed_len = observed_len.max(self.data.len() as u64);
        self
    }

    /// Number of bytes the client sent for this file
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.observed_len
    }

    /// Returns true when the part carried no content
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.observed_len == 0
    }
}

/// A file that passed validation and may be persisted
///
/// Only the content validator creates these. The storage writer takes
/// ownership, so a validated file is written at most once.
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    filename: String,
    content_type: String,
    data: Bytes,
}

impl ValidatedFile {
    pub(crate) const fn new(filename: String, content_type: String, data: Bytes) -> Self {
        Self {
            filename,
            content_type,
            data,
        }
    }

    /// Sanitized, collision-resistant target filename
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Verified MIME type (essence only, lowercase)
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// File content
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Extension of the target filename
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.filename.rsplit_once('.').map(|(_, ext)| ext)
    }

    /// Consumes the file and returns its content
    #[must_use]
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

/// Locator of a persisted file (relative URL or absolute URL)
///
/// # Examples
///
/// ```rust
/// use intake::storage::StoredReference;
///
/// let reference = StoredReference::new("/customers/avatar-1718000000000-1a2b3c4d.png");
/// assert_eq!(reference.extension(), Some("png"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredReference(String);

impl StoredReference {
    /// Wraps a locator string
    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// The locator as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension of the last path segment, ignoring any query string
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let path = self.0.split(['?', '#']).next().unwrap_or_default();
        let last = path.rsplit('/').next().unwrap_or_default();
        last.rsplit_once('.').map(|(_, ext)| ext)
    }

    /// Unwraps the locator
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StoredReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
