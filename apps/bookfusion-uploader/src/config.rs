//! Configuration management for the BookFusion uploader

use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, UploadError};

/// Calibre API root used when nothing else is configured
pub const DEFAULT_API_BASE: &str = "https://www.bookfusion.com/calibre-api/v1";

/// Environment variables checked for an API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["BF_API_KEY", "API_KEY"];

/// Environment variable overriding the API base
pub const API_BASE_ENV_VAR: &str = "BF_API_BASE";

/// Connection settings for the catalog service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub api_key: ApiKey,
    /// Per-request timeout handed to the HTTP client
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_base: impl Into<String>, api_key: ApiKey) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            api_base,
            api_key,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn init_url(&self) -> String {
        format!("{}/uploads/init", self.api_base)
    }

    pub fn finalize_url(&self) -> String {
        format!("{}/uploads/finalize", self.api_base)
    }

    /// Flag value, then `BF_API_BASE`, then [`DEFAULT_API_BASE`]
    pub fn resolve_api_base(flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| env::var(API_BASE_ENV_VAR).ok())
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
    }
}

/// Calibre API key, sent as the basic-auth user name
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        (!key.is_empty()).then_some(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Resolve the key from, in order: the flag value, the key file, then
    /// `BF_API_KEY` and `API_KEY`.
    pub fn resolve(flag: Option<&str>, key_file: Option<&Path>) -> Result<Self> {
        Self::resolve_with(flag, key_file, |name| env::var(name).ok())
    }

    fn resolve_with(
        flag: Option<&str>,
        key_file: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Some(key) = flag.and_then(Self::new) {
            return Ok(key);
        }

        if let Some(path) = key_file.filter(|path| path.is_file()) {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                UploadError::Configuration(format!("Cannot read API key file {}: {e}", path.display()))
            })?;
            if let Some(key) = Self::new(contents) {
                tracing::debug!(path = %path.display(), "Using API key from file");
                return Ok(key);
            }
        }

        API_KEY_ENV_VARS
            .iter()
            .find_map(|name| lookup(name).and_then(Self::new))
            .ok_or_else(|| {
                UploadError::Configuration(
                    "No API key. Use --api-key, --api-key-file, or set BF_API_KEY.".to_string(),
                )
            })
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
