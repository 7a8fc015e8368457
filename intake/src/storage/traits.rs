//! Storage writer trait definition

use super::types::{StorageResult, StoredReference, ValidatedFile};
use async_trait::async_trait;

/// Abstraction over the places a validated upload can be persisted
///
/// Handlers and the upload pipeline only see this trait, so the local disk
/// backend and the remote blob store are interchangeable through
/// configuration.
///
/// # Implementation Requirements
///
/// Implementations must:
/// - Never return a reference to partially written data
/// - Leave nothing referenced when `put` fails
/// - Be safe to call concurrently (filenames are already unique per request)
///
/// # Examples
///
/// ```rust,no_run
/// use intake::storage::{LocalStorageWriter, StorageWriter};
/// use std::path::PathBuf;
///
/// # fn example() -> anyhow::Result<()> {
/// let writer = LocalStorageWriter::new(PathBuf::from("./public"), "customers", "/customers")?;
/// assert_eq!(writer.backend(), "local");
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageWriter: Send + Sync {
    /// Durably persists the file and returns a locator for it
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The destination is unreachable (disk, network, permissions)
    /// - The target filename cannot be placed inside the destination
    async fn put(&self, file: ValidatedFile) -> StorageResult<StoredReference>;

    /// Short backend name used in logs and health output
    fn backend(&self) -> &'static str;
}
