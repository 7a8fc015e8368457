//! Configuration management
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `INTAKE_` prefix, `__` for nesting)
//! 2. `./intake.toml` (development)
//! 3. `~/.config/intake/config.toml` (user config, XDG)
//! 4. `/etc/intake/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Environment variable format: `INTAKE_SECTION__FIELD_NAME`
//! - Use `__` (double underscore) to separate nested sections
//! - Use `_` (single underscore) within field names
//! - Example: `INTAKE_UPLOAD__MAX_FILE_SIZE=5242880`
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:3000"
//!
//! [upload]
//! field_name = "file"
//! max_file_size = 10485760
//! allowed_mime_types = ["image/jpeg", "image/png", "image/gif"]
//! body_limit_bytes = 33554432
//! sniff_content = false
//!
//! [storage]
//! backend = "local"
//!
//! [storage.local]
//! root = "./public"
//! subpath = "customers"
//! url_prefix = "/customers"
//!
//! [storage.remote]
//! api_url = "https://blob.example.com"
//! token_secret = "change-me-to-something-long"
//! token_ttl_secs = 3600
//! # public_base_url = "https://cdn.example.com"
//! path_prefix = "customers"
//! request_timeout_ms = 30000
//! ```

use crate::storage::types::DEFAULT_FIELD_NAME;
use crate::storage::validation::{essence, DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_MAX_FILE_SIZE};
use anyhow::{bail, Context};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Request body limit applied to the upload route by default (32 MiB)
pub const DEFAULT_BODY_LIMIT_BYTES: u64 = 32 * 1024 * 1024;

const REDACTED: &str = "<redacted>";

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the server listens on
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
        }
    }
}

/// Upload acceptance rules
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UploadSettings {
    /// Multipart field carrying the file
    #[validate(length(min = 1))]
    pub field_name: String,

    /// Largest accepted file in bytes
    #[validate(range(min = 1))]
    pub max_file_size: u64,

    /// MIME types accepted for upload
    #[validate(length(min = 1))]
    pub allowed_mime_types: Vec<String>,

    /// Hard limit on the whole request body
    #[validate(range(min = 1))]
    pub body_limit_bytes: u64,

    /// Verify file signatures against the declared type
    pub sniff_content: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            field_name: DEFAULT_FIELD_NAME.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES.iter().map(ToString::to_string).collect(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            sniff_content: false,
        }
    }
}

impl UploadSettings {
    /// Body limit as a `usize` for axum's `DefaultBodyLimit`
    #[must_use]
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.body_limit_bytes).unwrap_or(usize::MAX)
    }
}

/// Which storage backend receives validated files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local filesystem below a served directory
    #[default]
    Local,
    /// Remote blob store
    Remote,
}

impl StorageBackend {
    /// Lowercase backend name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local filesystem backend settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LocalSettings {
    /// Directory served statically by the web tier
    pub root: PathBuf,

    /// Subdirectory of `root` receiving uploads
    pub subpath: PathBuf,

    /// URL prefix references are built from
    #[validate(length(min = 1))]
    pub url_prefix: String,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./public"),
            subpath: PathBuf::from("customers"),
            url_prefix: "/customers".to_string(),
        }
    }
}

/// Remote blob store settings
#[derive(Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RemoteSettings {
    /// Base URL of the blob store API
    #[validate(url)]
    pub api_url: String,

    /// Secret used to sign client upload tokens
    #[validate(length(min = 16))]
    pub token_secret: String,

    /// Lifetime of issued tokens in seconds
    #[validate(range(min = 1, max = 604_800))]
    pub token_ttl_secs: u64,

    /// Completion webhook the blob store should call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub callback_url: Option<String>,

    /// Origin the blob store serves stored objects from, when it differs
    /// from `api_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub public_base_url: Option<String>,

    /// Object path prefix for uploads
    pub path_prefix: String,

    /// Timeout for server-side uploads in milliseconds
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            api_url: "https://blob.example.com".to_string(),
            token_secret: String::new(),
            token_ttl_secs: 3600,
            callback_url: None,
            public_base_url: None,
            path_prefix: "customers".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("api_url", &self.api_url)
            .field("token_secret", &REDACTED)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("callback_url", &self.callback_url)
            .field("public_base_url", &self.public_base_url)
            .field("path_prefix", &self.path_prefix)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Active backend
    pub backend: StorageBackend,

    /// Local backend settings
    pub local: LocalSettings,

    /// Remote backend settings
    pub remote: RemoteSettings,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// HTTP server settings
    pub server: ServerSettings,

    /// Upload acceptance rules
    pub upload: UploadSettings,

    /// Storage backend selection and settings
    pub storage: StorageSettings,
}

impl IntakeConfig {
    /// Load configuration from the standard locations
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - The merged values fail validation
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use intake::config::IntakeConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = IntakeConfig::load()?;
    /// println!("listening on {}", config.server.bind);
    /// # Ok(())
    /// # }
    /// ```
    pub fn load() -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Toml::string(&toml::to_string(&Self::default())?));

        let system_config = PathBuf::from("/etc/intake/config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        let user_config = Self::recommended_path();
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config = PathBuf::from("./intake.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        figment = figment.merge(Env::prefixed("INTAKE_").split("__").lowercase(true));

        let config: Self = figment.extract()?;
        config.validate_settings()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Environment variables still override the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed, or the
    /// merged values fail validation.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            bail!("configuration file {} does not exist", path.display());
        }

        let config: Self = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path))
            .merge(Env::prefixed("INTAKE_").split("__").lowercase(true))
            .extract()
            .with_context(|| format!("failed to load {}", path.display()))?;

        config.validate_settings()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise from the standard locations
    ///
    /// # Errors
    ///
    /// See [`IntakeConfig::load`] and [`IntakeConfig::load_from`].
    pub fn load_with(path: Option<&Path>) -> anyhow::Result<Self> {
        path.map_or_else(Self::load, Self::load_from)
    }

    /// The recommended XDG config path
    #[must_use]
    pub fn recommended_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./intake.toml"),
            |config_dir| config_dir.join("intake").join("config.toml"),
        )
    }

    /// Checks value ranges and cross-field constraints
    ///
    /// Remote settings are only checked when the remote backend is active.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first offending section.
    pub fn validate_settings(&self) -> anyhow::Result<()> {
        self.upload.validate().context("invalid [upload] configuration")?;

        if self.upload.body_limit_bytes < self.upload.max_file_size {
            bail!(
                "upload.body_limit_bytes ({}) must not be smaller than upload.max_file_size ({})",
                self.upload.body_limit_bytes,
                self.upload.max_file_size
            );
        }

        if let Some(bad) = self.upload.allowed_mime_types.iter().find(|t| essence(t).is_none()) {
            bail!("upload.allowed_mime_types contains an invalid MIME type: {bad:?}");
        }

        match self.storage.backend {
            StorageBackend::Local => {
                self.storage.local.validate().context("invalid [storage.local] configuration")?;
            }
            StorageBackend::Remote => {
                self.storage.remote.validate().context("invalid [storage.remote] configuration")?;
            }
        }

        Ok(())
    }

    /// Copy safe to print, with the token secret masked
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.storage.remote.token_secret.is_empty() {
            config.storage.remote.token_secret = REDACTED.to_string();
        }
        config
    }
}
