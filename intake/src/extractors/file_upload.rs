//! Multipart file extractor
//!
//! Pulls the designated file field out of a `multipart/form-data` request.
//! Only the first part named after `upload.field_name` is considered; other
//! parts are skipped unread.
//!
//! The part is buffered up to `upload.max_file_size` bytes. Anything beyond
//! that is counted but dropped, so oversized uploads are still reported with
//! their real size without being held in memory.
//!
//! # Examples
//!
//! ```rust,no_run
//! use intake::extractors::FileUpload;
//! use axum::response::IntoResponse;
//!
//! async fn handler(FileUpload(request): FileUpload) -> impl IntoResponse {
//!     format!("Received: {} ({} bytes)", request.filename, request.size())
//! }
//! ```

use crate::config::UploadSettings;
use crate::error::UploadError;
use crate::storage::types::FALLBACK_CONTENT_TYPE;
use crate::storage::UploadRequest;
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        FromRef, FromRequest, Multipart, Request,
    },
    http::StatusCode,
};
use bytes::{Bytes, BytesMut};

/// Extractor for the single uploaded file of a submission
///
/// Rejects with [`UploadError::MissingFile`] when the request is not
/// multipart, the field is absent, or the field is not a file part, and
/// with [`UploadError::PayloadTooLarge`] when the request body limit trips.
#[derive(Debug)]
pub struct FileUpload(pub UploadRequest);

impl<S> FromRequest<S> for FileUpload
where
    UploadSettings: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = UploadError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let settings = UploadSettings::from_ref(state);

        let mut multipart = Multipart::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(%rejection, "request is not a multipart submission");
            UploadError::MissingFile
        })?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(&e, &settings))?
        {
            if field.name() != Some(settings.field_name.as_str()) {
                continue;
            }

            // A text value under the file field name is not a file
            let Some(filename) = field.file_name().map(ToString::to_string) else {
                return Err(UploadError::MissingFile);
            };
            let content_type = field
                .content_type()
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string();

            let (data, observed) = read_limited(field, &settings).await?;
            tracing::debug!(%filename, %content_type, size = observed, "file part received");

            return Ok(Self(
                UploadRequest::new(filename, content_type, data)
                    .with_field_name(settings.field_name.clone())
                    .with_observed_len(observed),
            ));
        }

        Err(UploadError::MissingFile)
    }
}

/// Buffers at most `max_file_size` bytes of a field and counts the rest
async fn read_limited(mut field: Field<'_>, settings: &UploadSettings) -> Result<(Bytes, u64), UploadError> {
    let mut buffer = BytesMut::new();
    let mut observed: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(&e, settings))? {
        observed = observed.saturating_add(chunk.len() as u64);

        let room = settings.max_file_size.saturating_sub(buffer.len() as u64);
        let take = usize::try_from(room).map_or(chunk.len(), |room| room.min(chunk.len()));
        buffer.extend_from_slice(&chunk[..take]);
    }

    Ok((buffer.freeze(), observed))
}

fn multipart_error(err: &MultipartError, settings: &UploadSettings) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return UploadError::PayloadTooLarge {
            actual: settings.body_limit_bytes,
            limit: settings.max_file_size,
        };
    }

    tracing::debug!(error = %err, "malformed multipart body");
    UploadError::MissingFile
}
