//! Local filesystem storage writer

use super::traits::StorageWriter;
use super::types::{StorageError, StorageResult, StoredReference, ValidatedFile};
use crate::config::LocalSettings;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Writes uploads below `root/subpath` and references them by URL prefix
///
/// # Directory Structure
///
/// ```text
/// ./public/                 <- root (served statically by the web tier)
/// └── customers/            <- subpath
///     ├── avatar-1718000000000-1a2b3c4d.png
///     └── .avatar-...part   <- in-flight write, never referenced
/// ```
///
/// Files are first written to a hidden temporary name in the destination
/// directory and hard-linked to their final name once flushed, so a
/// reference is only produced for complete files and an existing file is
/// never replaced. The directory is resolved through symlinks on every write
/// and must stay inside the root.
///
/// # Examples
///
/// ```rust,no_run
/// use intake::storage::LocalStorageWriter;
/// use std::path::PathBuf;
///
/// let writer = LocalStorageWriter::new(PathBuf::from("./public"), "customers", "/customers")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorageWriter {
    root: PathBuf,
    subpath: PathBuf,
    url_prefix: String,
}

impl LocalStorageWriter {
    /// Creates a writer for `root/subpath`
    ///
    /// The directories are created lazily on the first write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] if:
    /// - `root` exists and is not a directory
    /// - `subpath` is absolute or contains `..`
    pub fn new(
        root: PathBuf,
        subpath: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
    ) -> StorageResult<Self> {
        if root.exists() && !root.is_dir() {
            return Err(StorageError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let subpath = subpath.into();
        if !subpath.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
            return Err(StorageError::InvalidPath(format!(
                "{} must be a relative path inside the storage root",
                subpath.display()
            )));
        }

        Ok(Self {
            root,
            subpath,
            url_prefix: url_prefix.into(),
        })
    }

    /// Creates a writer from configuration
    ///
    /// # Errors
    ///
    /// See [`LocalStorageWriter::new`].
    pub fn from_settings(settings: &LocalSettings) -> StorageResult<Self> {
        Self::new(
            settings.root.clone(),
            settings.subpath.clone(),
            settings.url_prefix.clone(),
        )
    }

    /// Directory files are written to
    #[must_use]
    pub fn directory(&self) -> PathBuf {
        self.root.join(&self.subpath)
    }

    /// Creates the storage directory and returns its canonical path
    ///
    /// Fails if a symlink takes the directory outside the canonical root.
    async fn prepare_directory(&self) -> StorageResult<PathBuf> {
        let directory = self.directory();
        fs::create_dir_all(&directory).await?;

        let root = fs::canonicalize(&self.root).await?;
        let directory = fs::canonicalize(&directory).await?;
        if !directory.starts_with(&root) {
            return Err(StorageError::Other(format!(
                "storage directory {} resolves outside {}",
                self.subpath.display(),
                root.display()
            )));
        }
        Ok(directory)
    }

    fn reference_for(&self, filename: &str) -> StoredReference {
        StoredReference::new(format!(
            "{}/{filename}",
            self.url_prefix.trim_end_matches('/')
        ))
    }
}

/// Resolves the final path for a filename inside `directory`
///
/// The filename must be a single, non-hidden path component.
fn resolve(directory: &Path, filename: &str) -> StorageResult<PathBuf> {
    let mut components = Path::new(filename).components();
    let single_component = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_component || filename.starts_with('.') || filename.contains('\\') {
        return Err(StorageError::InvalidPath(filename.to_string()));
    }
    Ok(directory.join(filename))
}

/// Writes `data` to `target` through a temporary file in `directory`
///
/// Fails with [`std::io::ErrorKind::AlreadyExists`] if `target` exists. The
/// temporary file is removed whatever the outcome.
async fn write_no_replace(directory: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    let name = target.file_name().unwrap_or_default().to_string_lossy();
    let temp = directory.join(format!(".{name}.{}.part", Uuid::new_v4().simple()));

    let written = match write_new(&temp, data).await {
        Ok(()) => fs::hard_link(&temp, target).await,
        Err(e) => Err(e),
    };

    if let Err(cleanup) = fs::remove_file(&temp).await {
        tracing::debug!(error = %cleanup, "temporary upload file not removed");
    }
    written
}

/// Writes `data` to a file that must not exist yet
async fn write_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl StorageWriter for LocalStorageWriter {
    #[tracing::instrument(skip_all, fields(filename = %file.filename(), size = file.size()))]
    async fn put(&self, file: ValidatedFile) -> StorageResult<StoredReference> {
        let directory = self.prepare_directory().await?;
        let target = resolve(&directory, file.filename())?;

        write_no_replace(&directory, &target, file.data()).await?;

        tracing::debug!(path = %target.display(), "upload written to disk");
        Ok(self.reference_for(file.filename()))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
