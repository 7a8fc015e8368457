//! Upload pipeline
//!
//! Runs a received file through validation and storage:
//!
//! ```text
//! Received ──validate──> Validated ──put──> Stored ──> Success(reference)
//!     │                      │                 │
//!     └──────────────────────┴─────────────────┴──> Failure { stage, error }
//! ```
//!
//! Each request is independent. The validator and writer are shared
//! read-only, and a validated file is handed to the writer by value so it is
//! stored at most once.

pub mod result;

pub use result::{SuccessBody, UploadResult, UploadStage};

use crate::config::IntakeConfig;
use crate::storage::{ContentValidator, StorageWriter, UploadRequest};
use std::fmt;
use std::sync::Arc;

/// Validator and storage writer wired together
#[derive(Clone)]
pub struct UploadPipeline {
    validator: ContentValidator,
    writer: Arc<dyn StorageWriter>,
}

impl fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("validator", &self.validator)
            .field("backend", &self.writer.backend())
            .finish()
    }
}

impl UploadPipeline {
    /// Creates a pipeline
    #[must_use]
    pub fn new(validator: ContentValidator, writer: Arc<dyn StorageWriter>) -> Self {
        Self { validator, writer }
    }

    /// Creates a pipeline validating with the configured upload rules
    #[must_use]
    pub fn from_config(config: &IntakeConfig, writer: Arc<dyn StorageWriter>) -> Self {
        Self::new(ContentValidator::from_settings(&config.upload), writer)
    }

    /// The validator in use
    #[must_use]
    pub const fn validator(&self) -> &ContentValidator {
        &self.validator
    }

    /// Name of the storage backend
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.writer.backend()
    }

    /// Validates and stores one file
    ///
    /// Nothing is written when validation fails.
    #[tracing::instrument(
        skip_all,
        fields(filename = %request.filename, content_type = %request.content_type, size = request.size(), backend = self.backend())
    )]
    pub async fn ingest(&self, request: UploadRequest) -> UploadResult {
        let file = match self.validator.validate(request) {
            Ok(file) => file,
            Err(error) => return UploadResult::failed(UploadStage::Validate, error),
        };

        let filename = file.filename().to_string();
        match self.writer.put(file).await {
            Ok(reference) => {
                tracing::info!(%filename, reference = %reference, "upload stored");
                UploadResult::Success(reference)
            }
            Err(error) => UploadResult::failed(UploadStage::Store, error.into()),
        }
    }
}
