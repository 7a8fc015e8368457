//! Validation and persistence of uploaded files
//!
//! - [`validation::ContentValidator`] turns an [`UploadRequest`] into a
//!   [`ValidatedFile`]
//! - [`StorageWriter`] persists a [`ValidatedFile`] and returns a
//!   [`StoredReference`]
//! - [`LocalStorageWriter`] writes below a statically served directory
//! - [`RemoteBlobStore`] uploads to a blob store and issues client upload
//!   tokens

pub mod local;
pub mod remote;
pub mod traits;
pub mod types;
pub mod validation;

pub use local::LocalStorageWriter;
pub use remote::{BlobInfo, CompletionEvent, IssuedToken, RemoteBlobStore, TokenRequest, UploadTokenClaims};
#[cfg(test)]
pub use traits::MockStorageWriter;
pub use traits::StorageWriter;
pub use types::{StorageError, StorageResult, StoredReference, UploadRequest, ValidatedFile};
pub use validation::ContentValidator;
