//! Content validation for uploaded files
//!
//! Decides whether an [`UploadRequest`] may be persisted and turns it into a
//! [`ValidatedFile`]. Checks run in a fixed order and stop at the first
//! failure:
//!
//! 1. declared content type is on the allow-list
//! 2. size is within the configured maximum
//! 3. the original filename has a usable base name
//! 4. (optional) magic-number detection agrees with the declared type
//!
//! One exception to this order: a request body larger than
//! `upload.body_limit_bytes` is cut off while it is read, before the
//! validator sees it, so it fails as too large whatever its declared type.
//!
//! The extension of the stored file always comes from the verified MIME type.
//! Whatever extension the client sent is discarded, together with any
//! directory components.
//!
//! # Examples
//!
//! ```rust
//! use intake::storage::{validation::ContentValidator, UploadRequest};
//!
//! let validator = ContentValidator::default();
//! let request = UploadRequest::new("../../Me at the beach.PNG.exe", "image/png", vec![0x89, 0x50]);
//!
//! let file = validator.validate(request).unwrap();
//! assert!(file.filename().starts_with("Me-at-the-beach-PNG-"));
//! assert!(file.filename().ends_with(".png"));
//! ```

use super::types::{UploadRequest, ValidatedFile};
use crate::config::UploadSettings;
use crate::error::UploadError;
use uuid::Uuid;

/// Default MIME allow-list
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif"];

/// Default maximum file size (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Longest sanitized base name kept in a stored filename
pub const MAX_BASE_LEN: usize = 64;

/// Validator for uploads
#[derive(Debug, Clone)]
pub struct ContentValidator {
    allowed: Vec<String>,
    max_file_size: u64,
    sniff_content: bool,
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_MIME_TYPES.iter().copied(), DEFAULT_MAX_FILE_SIZE)
    }
}

impl ContentValidator {
    /// Creates a validator with an allow-list and a size limit
    ///
    /// Allow-list entries are normalized to lowercase MIME essences.
    #[must_use]
    pub fn new<I, T>(allowed: I, max_file_size: u64) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|t| essence(t.as_ref()).unwrap_or_else(|| t.as_ref().trim().to_ascii_lowercase()))
                .collect(),
            max_file_size,
            sniff_content: false,
        }
    }

    /// Builds a validator from upload settings
    #[must_use]
    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self::new(&settings.allowed_mime_types, settings.max_file_size).with_sniffing(settings.sniff_content)
    }

    /// Enables or disables magic-number verification
    #[must_use]
    pub const fn with_sniffing(mut self, enabled: bool) -> Self {
        self.sniff_content = enabled;
        self
    }

    /// The normalized allow-list
    #[must_use]
    pub fn allowed_types(&self) -> &[String] {
        &self.allowed
    }

    /// The configured maximum size in bytes
    #[must_use]
    pub const fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Runs all checks and produces a [`ValidatedFile`]
    ///
    /// # Errors
    ///
    /// - [`UploadError::MissingFile`] if the request is empty
    /// - [`UploadError::UnsupportedType`] if the type is not allowed, or
    ///   sniffing is enabled and the content disagrees with it
    /// - [`UploadError::PayloadTooLarge`] if the file exceeds the limit
    /// - [`UploadError::InvalidFilename`] if no base name survives sanitizing
    pub fn validate(&self, request: UploadRequest) -> Result<ValidatedFile, UploadError> {
        if request.is_empty() {
            return Err(UploadError::MissingFile);
        }

        let content_type = self.check_content_type(&request.content_type)?;
        self.check_size(request.size())?;
        let filename = self.derive_filename(&request.filename, &content_type)?;

        if self.sniff_content {
            self.check_magic(&request.data, &content_type)?;
        }

        Ok(ValidatedFile::new(filename, content_type, request.data))
    }

    /// Checks a declared content type and returns its normalized essence
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::UnsupportedType`] when the type does not parse
    /// or is not on the allow-list.
    pub fn check_content_type(&self, declared: &str) -> Result<String, UploadError> {
        match essence(declared) {
            Some(essence) if self.allowed.iter().any(|t| *t == essence) => Ok(essence),
            _ => Err(UploadError::UnsupportedType {
                actual: declared.trim().to_string(),
                allowed: self.allowed.clone(),
            }),
        }
    }

    /// Checks a byte count against the maximum
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::PayloadTooLarge`] when `size` exceeds the limit.
    pub const fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size > self.max_file_size {
            return Err(UploadError::PayloadTooLarge {
                actual: size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Generates the stored filename for an original name and verified type
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidFilename`] when nothing usable is left
    /// of the original name.
    pub fn derive_filename(&self, original: &str, content_type: &str) -> Result<String, UploadError> {
        let base = sanitize_base(original).ok_or_else(|| UploadError::InvalidFilename(original.to_string()))?;
        Ok(format!("{base}-{}.{}", uniqueness_token(), extension_for(content_type)))
    }

    fn check_magic(&self, data: &[u8], declared: &str) -> Result<(), UploadError> {
        match detect_mime(data) {
            Some(detected) if detected == declared => Ok(()),
            detected => {
                tracing::warn!(
                    declared,
                    detected = detected.unwrap_or("unknown"),
                    "content does not match declared type"
                );
                Err(UploadError::UnsupportedType {
                    actual: detected.unwrap_or("unknown").to_string(),
                    allowed: self.allowed.clone(),
                })
            }
        }
    }
}

/// Lowercase MIME essence (`type/subtype`) without parameters
#[must_use]
pub fn essence(content_type: &str) -> Option<String> {
    content_type
        .trim()
        .parse::<mime::Mime>()
        .ok()
        .map(|m| m.essence_str().to_ascii_lowercase())
}

/// Reduces an original filename to a safe base name
///
/// Drops directory components (`/` and `\`), the trailing extension, and
/// every character outside `[A-Za-z0-9_-]`. Runs of dropped characters
/// become a single `-`. Returns `None` if nothing is left.
///
/// # Examples
///
/// ```rust
/// use intake::storage::validation::sanitize_base;
///
/// assert_eq!(sanitize_base("C:\\Users\\me\\My Photo.jpeg").as_deref(), Some("My-Photo"));
/// assert_eq!(sanitize_base("../../etc/passwd").as_deref(), Some("passwd"));
/// assert_eq!(sanitize_base(".png"), None);
/// assert_eq!(sanitize_base(".."), None);
/// ```
#[must_use]
pub fn sanitize_base(original: &str) -> Option<String> {
    let name = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    };

    let mut base = String::with_capacity(stem.len().min(MAX_BASE_LEN));
    let mut pending_dash = false;
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            let separated = pending_dash && !base.is_empty();
            if base.len() + usize::from(separated) + 1 > MAX_BASE_LEN {
                break;
            }
            if separated {
                base.push('-');
            }
            pending_dash = false;
            base.push(c);
        } else {
            pending_dash = true;
        }
    }

    let base = base.trim_matches('-');
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

/// Extension stored files of the given MIME type receive
#[must_use]
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

/// MIME type detected from the file signature, if recognizable
#[must_use]
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.mime_type())
}

/// Per-upload suffix: unix milliseconds plus eight random hex digits
fn uniqueness_token() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    format!("{millis}-{}", &random[..8])
}
