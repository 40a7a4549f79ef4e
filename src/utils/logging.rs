//! Structured logging and security-focused trace utilities.
//!
//! This module configures the `tracing` ecosystem for the application,
//! supporting multiple output formats and providing utilities to prevent
//! bearer tokens from leaking into logs.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::{Result, SessionError};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

lazy_static! {
    static ref BEARER_HEADER: Regex =
        Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]+").expect("valid bearer pattern");
    static ref JWT_LIKE: Regex =
        Regex::new(r"eyJ[A-Za-z0-9_-]*\.[A-Za-z0-9_-]*\.[A-Za-z0-9_-]*").expect("valid token pattern");
}

/// Initializes the global tracing subscriber for the application.
///
/// Supports two output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `pretty` (default): Human-readable, colorized output for development.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    // Configure filter from environment or config file
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| SessionError::Config(format!("Invalid log level: {}", e)))?;

    let installed = match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        "compact" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    installed.map_err(|e| SessionError::Internal(format!("Logging already initialized: {}", e)))
}

/// Replaces bearer credentials in `input` with placeholders.
///
/// Both `Bearer <token>` header values and bare JWT-shaped strings
/// (`eyJ...`.`...`.`...`) are redacted.
pub fn sanitize(input: &str) -> String {
    let result = BEARER_HEADER.replace_all(input, "Bearer [REDACTED]");
    JWT_LIKE
        .replace_all(&result, "[REDACTED_TOKEN]")
        .into_owned()
}

/// Short, stable identifier for a token that is safe to log.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}
