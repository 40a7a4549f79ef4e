//! Configuration data structures for session-recovery.
//!
//! This module defines the schema for the application settings: the HTTP
//! client, the retry budget, what a session teardown clears, and logging.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::error::Result;
use crate::retry::RetryConfig;
use crate::session::cookies::{
    expiry_directives, CookieExpiry, DEFAULT_COOKIE_DOMAINS, DEFAULT_COOKIE_NAMES,
};
use crate::session::TeardownSettings;
use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Outbound HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry budget and backoff bounds.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Session teardown settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the outbound API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL every request path is joined onto.
    /// Default: `http://localhost:3000`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt request timeout in seconds.
    /// Default: `30`
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connection timeout in seconds.
    /// Default: `10`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Session provider endpoint used for sign-out.
    /// Default: `/api/auth/signout`
    #[serde(default = "default_signout_path")]
    pub signout_path: String,
}

/// Retry settings as they appear in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    /// Default: `3`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    /// Default: `1000`
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound on any delay, in milliseconds.
    /// Default: `10000`
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Random share (0..=1) a delay may be shortened by.
    /// Default: `0.0` (deterministic)
    #[serde(default)]
    pub jitter_factor: f64,
}

impl RetrySettings {
    /// Validates the settings into an immutable `RetryConfig`.
    pub fn to_retry_config(&self) -> Result<RetryConfig> {
        RetryConfig::new(self.max_retries, self.initial_delay_ms, self.max_delay_ms)?
            .with_jitter(self.jitter_factor)
    }
}

/// What a session teardown clears and where it lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path navigated to after teardown.
    /// Default: `/`
    #[serde(default = "default_home_path")]
    pub home_path: String,

    /// Cookie names expired on teardown.
    #[serde(default = "default_cookie_names")]
    pub cookie_names: Vec<String>,

    /// Explicit domains each cookie is also expired under.
    /// Default: `["localhost", ".localhost"]`
    #[serde(default = "default_cookie_domains")]
    pub cookie_domains: Vec<String>,

    /// Seconds before `exp` at which a session counts as expired.
    /// Default: `60`
    #[serde(default = "default_expiry_buffer")]
    pub expiry_buffer_seconds: i64,
}

impl SessionConfig {
    pub fn cookie_expiries(&self) -> Vec<CookieExpiry> {
        expiry_directives(&self.cookie_names, &self.cookie_domains)
    }

    pub fn teardown_settings(&self) -> TeardownSettings {
        TeardownSettings {
            home_path: self.home_path.clone(),
            cookies: self.cookie_expiries(),
        }
    }
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default trait implementations linking to custom logic

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            signout_path: default_signout_path(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            jitter_factor: 0.0,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            home_path: default_home_path(),
            cookie_names: default_cookie_names(),
            cookie_domains: default_cookie_domains(),
            expiry_buffer_seconds: default_expiry_buffer(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults and shared constants
fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_signout_path() -> String {
    "/api/auth/signout".to_string()
}

fn default_max_retries() -> u32 {
    crate::retry::RetryConfig::default().max_retries()
}

fn default_initial_delay() -> u64 {
    crate::retry::RetryConfig::default().initial_delay_ms()
}

fn default_max_delay() -> u64 {
    crate::retry::RetryConfig::default().max_delay_ms()
}

fn default_home_path() -> String {
    "/".to_string()
}

fn default_cookie_names() -> Vec<String> {
    DEFAULT_COOKIE_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_cookie_domains() -> Vec<String> {
    DEFAULT_COOKIE_DOMAINS.iter().map(|s| s.to_string()).collect()
}

fn default_expiry_buffer() -> i64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
