//! Client upload token command

use anyhow::{bail, Result};
use intake::config::{IntakeConfig, StorageBackend};
use intake::storage::{ContentValidator, RemoteBlobStore, TokenRequest};
use std::path::PathBuf;

/// Issue a client upload token for the remote blob store
#[derive(Debug, Clone)]
pub struct TokenCommand {
    /// Original filename of the file to upload
    pub pathname: String,
    /// Content type of the file to upload
    pub content_type: String,
    /// Opaque value embedded in the token
    pub client_payload: Option<String>,
    /// Explicit configuration file
    pub config: Option<PathBuf>,
}

impl TokenCommand {
    /// Render the issued token as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the remote backend is not configured or the
    /// request is rejected.
    pub fn render(&self) -> Result<String> {
        let config = IntakeConfig::load_with(self.config.as_deref())?;
        self.render_with(&config)
    }

    /// Render using an already loaded configuration
    ///
    /// # Errors
    ///
    /// See [`TokenCommand::render`].
    pub fn render_with(&self, config: &IntakeConfig) -> Result<String> {
        if config.storage.backend != StorageBackend::Remote {
            bail!("tokens require storage.backend = \"remote\" (currently \"{}\")", config.storage.backend);
        }

        let store = RemoteBlobStore::new(&config.storage.remote, ContentValidator::from_settings(&config.upload))?;
        let issued = store.issue_token(&TokenRequest {
            pathname: self.pathname.clone(),
            content_type: self.content_type.clone(),
            client_payload: self.client_payload.clone(),
        })?;

        Ok(serde_json::to_string_pretty(&issued)?)
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// See [`TokenCommand::render`].
    pub fn execute(&self) -> Result<()> {
        println!("{}", self.render()?);
        Ok(())
    }
}
