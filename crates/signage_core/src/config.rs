//! REST store connection settings.
//!
//! # Responsibility
//! - Describe where the remote data store lives and how to reach it.
//! - Validate settings before any transport is built from them.
//!
//! # Invariants
//! - Settings are passed explicitly into transports; core never reads
//!   process-wide endpoint state.

use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the remote REST data store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Base URL without trailing slash, e.g. `https://store.example.com/api`.
    pub base_url: String,
    /// Per-request timeout enforced by the transport.
    pub timeout_secs: u64,
    /// Optional bearer token sent with every request.
    pub api_key: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key: None,
        }
    }
}

impl StoreConfig {
    /// Creates settings for `base_url` with default timeout and no api key.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Checks settings and returns the normalized base URL.
    ///
    /// # Errors
    /// - `EmptyBaseUrl` when the URL is blank.
    /// - `UnsupportedScheme` when the URL is not `http://` or `https://`.
    /// - `ZeroTimeout` when `timeout_secs == 0`.
    pub fn validate(&self) -> Result<String, ConfigError> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::UnsupportedScheme(trimmed.to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(trimmed.to_string())
    }
}

/// Invalid store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyBaseUrl,
    UnsupportedScheme(String),
    ZeroTimeout,
    /// Api key contains bytes that are not valid in an HTTP header.
    InvalidApiKey,
    /// HTTP client construction failed.
    ClientBuild(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBaseUrl => write!(f, "store base url must not be empty"),
            Self::UnsupportedScheme(url) => {
                write!(f, "store base url must use http or https: {url}")
            }
            Self::ZeroTimeout => write!(f, "store timeout must be greater than zero"),
            Self::InvalidApiKey => write!(f, "store api key is not a valid header value"),
            Self::ClientBuild(message) => write!(f, "failed to build http client: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig};

    #[test]
    fn validate_trims_trailing_slash() {
        let config = StoreConfig::new("https://store.example.com/api/");
        assert_eq!(
            config.validate().expect("valid config"),
            "https://store.example.com/api"
        );
    }

    #[test]
    fn validate_rejects_bad_settings() {
        assert_eq!(
            StoreConfig::new("  ").validate(),
            Err(ConfigError::EmptyBaseUrl)
        );
        assert!(matches!(
            StoreConfig::new("ftp://store").validate(),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert_eq!(
            StoreConfig::default().with_timeout_secs(0).validate(),
            Err(ConfigError::ZeroTimeout)
        );
    }
}
