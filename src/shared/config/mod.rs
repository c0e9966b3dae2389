//! Application configuration module
//!
//! Provides the serializable configuration shared by every coordinator, a builder,
//! and TOML loading.

use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_LOGIN_PATH: &str = "/api/auth/login";
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh-token";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend base URL
    pub server_url: String,
    /// Total request timeout. `None` inherits the transport default (no timeout).
    pub request_timeout_ms: Option<u64>,
    /// Auto-save quiet period
    pub commit_delay_ms: u64,
    /// How long the suppression flag outlives a post-save refresh
    pub settle_delay_ms: u64,
    /// Lifetime of a success message
    pub success_message_ttl_ms: u64,
    /// How long before expiry the access token is renewed
    pub refresh_lead_time_secs: u64,
    pub login_path: String,
    pub refresh_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_ms: None,
            commit_delay_ms: 3_000,
            settle_delay_ms: 200,
            success_message_ttl_ms: 3_000,
            refresh_lead_time_secs: 300,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.server_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                self.server_url
            )));
        }
        for (name, path) in [("login_path", &self.login_path), ("refresh_path", &self.refresh_path)] {
            if path.is_empty() {
                return Err(ConfigError::MissingValue(name));
            }
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidValue {
                    field: name,
                    message: "must start with '/'".to_string(),
                });
            }
        }
        if self.commit_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "commit_delay_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                message: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn request_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.request_timeout_ms = Some(timeout);
        self
    }

    pub fn commit_delay_ms(mut self, delay: u64) -> Self {
        self.config.commit_delay_ms = delay;
        self
    }

    pub fn settle_delay_ms(mut self, delay: u64) -> Self {
        self.config.settle_delay_ms = delay;
        self
    }

    pub fn success_message_ttl_ms(mut self, ttl: u64) -> Self {
        self.config.success_message_ttl_ms = ttl;
        self
    }

    pub fn refresh_lead_time_secs(mut self, lead: u64) -> Self {
        self.config.refresh_lead_time_secs = lead;
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.config.login_path = path.into();
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
