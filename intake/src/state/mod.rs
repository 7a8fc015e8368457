//! Application state management

use crate::config::{IntakeConfig, StorageBackend, UploadSettings};
use crate::pipeline::UploadPipeline;
use crate::storage::{ContentValidator, LocalStorageWriter, RemoteBlobStore, StorageWriter};
use axum::extract::FromRef;
use std::sync::Arc;

/// Shared state handed to every handler
///
/// Everything inside is immutable after startup, so cloning per request is
/// cheap and needs no locking.
///
/// # Example
///
/// ```rust,no_run
/// use intake::{config::IntakeConfig, state::IntakeState};
///
/// # fn example() -> anyhow::Result<()> {
/// let state = IntakeState::from_config(IntakeConfig::load()?)?;
/// let app = intake::server::router(state);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IntakeState {
    config: Arc<IntakeConfig>,
    pipeline: Arc<UploadPipeline>,
    remote: Option<Arc<RemoteBlobStore>>,
}

impl IntakeState {
    /// Builds the state and the configured storage backend
    ///
    /// # Errors
    ///
    /// Returns an error if the configured backend cannot be constructed.
    pub fn from_config(config: IntakeConfig) -> anyhow::Result<Self> {
        let validator = ContentValidator::from_settings(&config.upload);

        let (writer, remote): (Arc<dyn StorageWriter>, Option<Arc<RemoteBlobStore>>) = match config.storage.backend {
            StorageBackend::Local => {
                let local = LocalStorageWriter::from_settings(&config.storage.local)?;
                (Arc::new(local) as Arc<dyn StorageWriter>, None)
            }
            StorageBackend::Remote => {
                let store = Arc::new(RemoteBlobStore::new(&config.storage.remote, validator.clone())?);
                (Arc::clone(&store) as Arc<dyn StorageWriter>, Some(store))
            }
        };

        tracing::info!(backend = writer.backend(), "storage backend ready");
        Ok(Self {
            pipeline: Arc::new(UploadPipeline::new(validator, writer)),
            config: Arc::new(config),
            remote,
        })
    }

    /// Builds the state around an existing writer
    ///
    /// No remote token endpoints are available in this state.
    #[must_use]
    pub fn with_writer(config: IntakeConfig, writer: Arc<dyn StorageWriter>) -> Self {
        Self {
            pipeline: Arc::new(UploadPipeline::from_config(&config, writer)),
            config: Arc::new(config),
            remote: None,
        }
    }

    /// Get configuration reference
    #[must_use]
    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// The upload pipeline
    #[must_use]
    pub fn pipeline(&self) -> &UploadPipeline {
        &self.pipeline
    }

    /// The remote blob store, when that backend is active
    #[must_use]
    pub fn remote(&self) -> Option<&Arc<RemoteBlobStore>> {
        self.remote.as_ref()
    }
}

impl FromRef<IntakeState> for UploadSettings {
    fn from_ref(state: &IntakeState) -> Self {
        state.config.upload.clone()
    }
}

impl FromRef<IntakeState> for Arc<UploadPipeline> {
    fn from_ref(state: &IntakeState) -> Self {
        Arc::clone(&state.pipeline)
    }
}
