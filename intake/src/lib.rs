//! intake: validated image upload ingestion
//!
//! Accepts a single file from a `multipart/form-data` submission, checks its
//! declared type, size and name, persists it through a pluggable storage
//! backend, and answers with a JSON body naming where the file can be found.
//!
//! ```text
//! multipart POST ─> FileUpload ─> ContentValidator ─> StorageWriter ─> { "fileUrl": ... }
//!                       │               │                  │
//!                       └───────────────┴──────────────────┴──> { "error": ... }
//! ```
//!
//! Two storage backends are available:
//! - **local**: writes below a statically served directory and returns a
//!   relative URL such as `/customers/avatar-1718000000000-1a2b3c4d.png`
//! - **remote**: uploads to a blob store, and can issue short-lived client
//!   upload tokens so browsers upload directly
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use intake::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     observability::init(&ObservabilityConfig::default())?;
//!
//!     let config = IntakeConfig::load()?;
//!     let app = server::router(IntakeState::from_config(config)?);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod state;
pub mod storage;

#[cfg(test)]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::config::{IntakeConfig, StorageBackend, UploadSettings};
    pub use super::error::{ErrorKind, UploadError};
    pub use super::extractors::FileUpload;
    pub use super::observability::{self, ObservabilityConfig};
    pub use super::pipeline::{UploadPipeline, UploadResult, UploadStage};
    pub use super::server;
    pub use super::state::IntakeState;
    pub use super::storage::{
        ContentValidator, LocalStorageWriter, RemoteBlobStore, StorageWriter, StoredReference, UploadRequest,
        ValidatedFile,
    };

    pub use anyhow;
    pub use axum;
    pub use serde;
    pub use serde_json;
    pub use tokio;
}
