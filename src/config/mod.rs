// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{Result, SessionError};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `SESSION_RECOVERY_RETRY__MAX_RETRIES=5`.
pub const ENV_PREFIX: &str = "SESSION_RECOVERY";

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file (`~/.session-recovery/config.toml`, optional)
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        Self::build(Self::default_config_path(), false)
    }

    /// Same as [`load`](Self::load) but with an explicit, required file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(path.as_ref().to_path_buf(), true)
    }

    fn build(path: PathBuf, required: bool) -> Result<Self> {
        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            // Load from config file
            .add_source(File::from(path).required(required))
            // Override with environment variables
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("session.cookie_names")
                    .with_list_parse_key("session.cookie_domains")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SessionError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| SessionError::Config(e.to_string()))?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Rejects settings that would only fail later, at first use.
    pub fn validate(&self) -> Result<()> {
        self.retry.to_retry_config()?;

        if !self.session.home_path.starts_with('/') {
            return Err(SessionError::Config(format!(
                "session.home_path must be an absolute path, got `{}`",
                self.session.home_path
            )));
        }
        if !self.http.signout_path.starts_with('/') {
            return Err(SessionError::Config(format!(
                "http.signout_path must be an absolute path, got `{}`",
                self.http.signout_path
            )));
        }

        Ok(())
    }

    /// Effective configuration rendered as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".session-recovery")
            .join("config.toml")
    }
}
