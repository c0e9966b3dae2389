use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use std::path::PathBuf;
use std::time::Duration;

/// Overrides the backend base URL
pub const API_URL_ENV: &str = "CARESYNC_API_URL";
/// Path of a TOML config file
pub const CONFIG_PATH_ENV: &str = "CARESYNC_CONFIG";

/// Client configuration wrapper.
///
/// Resolution order: defaults, then the TOML file (`CARESYNC_CONFIG`, else
/// `<config dir>/caresync/config.toml` when it exists), then `CARESYNC_API_URL`.
#[derive(Debug, Clone, Default)]
pub struct Config {
    app: AppConfig,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_app(app: AppConfig) -> Result<Self, ConfigError> {
        app.validate()?;
        Ok(Self { app })
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self { app: builder.build()? })
    }

    /// Load from the config file and environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut app = match config_file_path() {
            Some(path) => {
                tracing::info!("[CONFIG] Loading {}", path.display());
                AppConfig::load(&path)?
            }
            None => AppConfig::default(),
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            app.server_url = url;
        }

        Self::from_app(app)
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url().trim_end_matches('/'), path)
    }

    pub fn server_url(&self) -> &str {
        &self.app.server_url
    }

    pub fn login_path(&self) -> &str {
        &self.app.login_path
    }

    pub fn refresh_path(&self) -> &str {
        &self.app.refresh_path
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.app.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.app.commit_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.app.settle_delay_ms)
    }

    pub fn success_message_ttl(&self) -> Duration {
        Duration::from_millis(self.app.success_message_ttl_ms)
    }

    pub fn refresh_lead_time(&self) -> Duration {
        Duration::from_secs(self.app.refresh_lead_time_secs)
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("caresync").join("config.toml"))
        .filter(|path| path.is_file())
}
