//! Remote blob storage with client upload tokens
//!
//! Two ways of getting a file into the blob store are supported:
//!
//! - **Client upload** (two-phase): the browser asks for a token scoped to a
//!   generated pathname and the allowed content types, uploads straight to
//!   the blob store, and the blob store calls the completion webhook with
//!   `{ blob: { url }, tokenPayload }`. [`RemoteBlobStore::complete`]
//!   verifies the token and forwards the resulting reference to subscribers.
//! - **Server upload**: [`StorageWriter::put`] mints a token for a validated
//!   file and `PUT`s the bytes to `{api_url}/{pathname}`.
//!
//! Tokens are HS256 JWTs signed with the configured secret. Expired tokens
//! are rejected; nothing is retried here.
//!
//! A completion is only accepted for an object on the blob store's public
//! origin (`public_base_url`, or `api_url` when unset), and only once per
//! token pathname while that token is live.

use super::traits::StorageWriter;
use super::types::{StorageError, StorageResult, StoredReference, ValidatedFile};
use super::validation::{essence, ContentValidator};
use crate::config::RemoteSettings;
use crate::error::UploadError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// Longest accepted token lifetime (7 days)
pub const MAX_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Shortest accepted signing secret
pub const MIN_SECRET_LEN: usize = 16;

const COMPLETION_CHANNEL_CAPACITY: usize = 64;

/// Claims carried by a client upload token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTokenClaims {
    /// Object path the token allows writing to
    pub pathname: String,
    /// MIME types the blob store may accept for this upload
    pub allowed_content_types: Vec<String>,
    /// Size limit the blob store must enforce
    pub maximum_size_in_bytes: u64,
    /// Where the blob store reports completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    /// Opaque value the client asked to have echoed back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_payload: Option<String>,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Body of a token request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Original filename chosen by the user
    pub pathname: String,
    /// Content type the browser reports for the file
    pub content_type: String,
    /// Opaque value to embed in the token
    #[serde(default)]
    pub client_payload: Option<String>,
}

/// A signed client upload token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    /// The JWT to present to the blob store
    pub client_token: String,
    /// Generated object path the token is scoped to
    pub pathname: String,
    /// Where the client should upload the bytes
    pub upload_url: String,
    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// Blob description sent by the blob store on completion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    /// Public URL of the stored object
    pub url: String,
    /// Object path, when reported
    #[serde(default)]
    pub pathname: Option<String>,
    /// Stored content type, when reported
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Completion webhook body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    /// The stored object
    pub blob: BlobInfo,
    /// The token the upload was authorized with
    pub token_payload: String,
}

#[derive(Debug, Deserialize)]
struct PutBlobResponse {
    url: String,
}

/// Remote blob store backend
pub struct RemoteBlobStore {
    api_url: String,
    public_base: reqwest::Url,
    path_prefix: String,
    callback_url: Option<String>,
    token_ttl: TimeDelta,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validator: ContentValidator,
    client: reqwest::Client,
    completions: broadcast::Sender<StoredReference>,
    /// Completed pathnames mapped to their token expiry
    completed: Mutex<HashMap<String, i64>>,
}

impl fmt::Debug for RemoteBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBlobStore")
            .field("api_url", &self.api_url)
            .field("public_base", &self.public_base.as_str())
            .field("path_prefix", &self.path_prefix)
            .field("callback_url", &self.callback_url)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

impl RemoteBlobStore {
    /// Creates a blob store client
    ///
    /// `validator` decides which content types and sizes tokens allow and
    /// how pathnames are generated.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Other`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes, the public base URL cannot be parsed, or
    /// the HTTP client cannot be built.
    pub fn new(settings: &RemoteSettings, validator: ContentValidator) -> StorageResult<Self> {
        if settings.token_secret.len() < MIN_SECRET_LEN {
            return Err(StorageError::Other(format!(
                "remote token secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        let public_base = settings.public_base_url.as_deref().unwrap_or(&settings.api_url);
        let public_base = reqwest::Url::parse(public_base)
            .map_err(|e| StorageError::Other(format!("invalid blob store URL {public_base}: {e}")))?;
        if public_base.cannot_be_a_base() {
            return Err(StorageError::Other(format!("blob store URL {public_base} cannot be a base")));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|e| StorageError::Other(format!("failed to build HTTP client: {e}")))?;

        let ttl_secs = settings.token_ttl_secs.clamp(1, MAX_TOKEN_TTL_SECS);
        let (completions, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);

        Ok(Self {
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            public_base,
            path_prefix: settings.path_prefix.trim_matches('/').to_string(),
            callback_url: settings.callback_url.clone(),
            token_ttl: TimeDelta::seconds(i64::try_from(ttl_secs).unwrap_or(1)),
            encoding_key: EncodingKey::from_secret(settings.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.token_secret.as_bytes()),
            validator,
            client,
            completions,
            completed: Mutex::new(HashMap::new()),
        })
    }

    /// Subscribes to references confirmed by the completion webhook
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoredReference> {
        self.completions.subscribe()
    }

    /// Issues a client upload token for a file the user is about to upload
    ///
    /// # Errors
    ///
    /// - [`UploadError::UnsupportedType`] if the content type is not allowed
    /// - [`UploadError::InvalidFilename`] if the name has no usable base
    /// - [`UploadError::StorageUnavailable`] if signing fails
    #[tracing::instrument(skip_all, fields(pathname = %request.pathname, content_type = %request.content_type))]
    pub fn issue_token(&self, request: &TokenRequest) -> Result<IssuedToken, UploadError> {
        let content_type = self.validator.check_content_type(&request.content_type)?;
        let filename = self.validator.derive_filename(&request.pathname, &content_type)?;
        let pathname = self.pathname_for(&filename);

        let claims = self.claims_for(pathname, request.client_payload.clone());
        let client_token = self.sign(&claims)?;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);

        tracing::info!(pathname = %claims.pathname, %expires_at, "client upload token issued");
        Ok(IssuedToken {
            client_token,
            upload_url: self.upload_url(&claims.pathname),
            pathname: claims.pathname,
            expires_at,
        })
    }

    /// Verifies a token and returns its claims
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::TokenInvalid`] for bad signatures, malformed
    /// tokens and expired tokens.
    pub fn verify(&self, token: &str) -> Result<UploadTokenClaims, UploadError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<UploadTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| UploadError::TokenInvalid(e.to_string()))
    }

    /// Handles the blob store's completion callback
    ///
    /// The token must be valid and unexpired, the blob URL must be on the
    /// blob store's public origin and point at the token's pathname, a
    /// reported content type must be allowed by the token, and the token's
    /// pathname must not have been completed already. The confirmed
    /// reference is broadcast to subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::TokenInvalid`] if any of these checks fail.
    #[tracing::instrument(skip_all, fields(url = %event.blob.url))]
    pub fn complete(&self, event: &CompletionEvent) -> Result<StoredReference, UploadError> {
        let claims = self.verify(&event.token_payload)?;

        let url = reqwest::Url::parse(&event.blob.url)
            .map_err(|e| UploadError::TokenInvalid(format!("blob url is not a valid URL: {e}")))?;
        if url.origin() != self.public_base.origin() {
            return Err(UploadError::TokenInvalid(format!(
                "blob origin {} is not the blob store origin {}",
                url.origin().ascii_serialization(),
                self.public_base.origin().ascii_serialization()
            )));
        }

        let expected_path = format!("{}/{}", self.public_base.path().trim_end_matches('/'), claims.pathname);
        if url.path() != expected_path {
            return Err(UploadError::TokenInvalid(format!(
                "blob path {} does not match token pathname {}",
                url.path(),
                claims.pathname
            )));
        }

        if let Some(content_type) = &event.blob.content_type {
            let allowed = essence(content_type)
                .is_some_and(|e| claims.allowed_content_types.iter().any(|t| *t == e));
            if !allowed {
                return Err(UploadError::TokenInvalid(format!(
                    "blob content type {content_type} is not allowed by the token"
                )));
            }
        }

        self.mark_completed(&claims)?;

        let reference = StoredReference::new(event.blob.url.clone());
        if self.completions.send(reference.clone()).is_err() {
            tracing::debug!("no subscribers for completed uploads");
        }

        tracing::info!(reference = %reference, pathname = %claims.pathname, "remote upload completed");
        Ok(reference)
    }

    /// Records a completed pathname, refusing one already recorded
    ///
    /// Entries whose token has expired are dropped.
    fn mark_completed(&self, claims: &UploadTokenClaims) -> Result<(), UploadError> {
        let now = Utc::now().timestamp();
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        completed.retain(|_, exp| *exp >= now);

        if completed.contains_key(&claims.pathname) {
            return Err(UploadError::TokenInvalid(format!(
                "upload {} was already completed",
                claims.pathname
            )));
        }
        completed.insert(claims.pathname.clone(), claims.exp);
        drop(completed);
        Ok(())
    }

    fn pathname_for(&self, filename: &str) -> String {
        if self.path_prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{filename}", self.path_prefix)
        }
    }

    fn upload_url(&self, pathname: &str) -> String {
        format!("{}/{pathname}", self.api_url)
    }

    fn claims_for(&self, pathname: String, client_payload: Option<String>) -> UploadTokenClaims {
        let issued_at = Utc::now();
        UploadTokenClaims {
            pathname,
            allowed_content_types: self.validator.allowed_types().to_vec(),
            maximum_size_in_bytes: self.validator.max_file_size(),
            callback_url: self.callback_url.clone(),
            client_payload,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.token_ttl).timestamp(),
        }
    }

    fn sign(&self, claims: &UploadTokenClaims) -> StorageResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| StorageError::Other(format!("failed to sign upload token: {e}")))
    }
}

#[async_trait]
impl StorageWriter for RemoteBlobStore {
    #[tracing::instrument(skip_all, fields(filename = %file.filename(), size = file.size()))]
    async fn put(&self, file: ValidatedFile) -> StorageResult<StoredReference> {
        let pathname = self.pathname_for(file.filename());
        let token = self.sign(&self.claims_for(pathname.clone(), None))?;
        let content_type = file.content_type().to_string();

        let response = self
            .client
            .put(self.upload_url(&pathname))
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .body(file.into_data())
            .send()
            .await
            .map_err(|e| StorageError::Remote(format!("upload request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Remote(format!("blob store answered {status}")));
        }

        let body: PutBlobResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Remote(format!("unreadable blob store response: {e}")))?;

        tracing::debug!(url = %body.url, "upload stored remotely");
        Ok(StoredReference::new(body.url))
    }

    fn backend(&self) -> &'static str {
        "remote"
    }
}
