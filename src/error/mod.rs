// Error types for session-recovery
// Author: kelexine (https://github.com/kelexine)

use crate::retry::{Abortable, ClassifyFailure, FailureClass};
use thiserror::Error;

/// Transport-level failure reported before any HTTP response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCode {
    /// Host or network could not be reached (refused, reset, DNS).
    NetworkUnreachable,
    /// Local resources ran out (sockets, memory, file handles).
    ResourceExhausted,
    /// Connect or read deadline elapsed.
    TimedOut,
    /// Anything else, e.g. an invalid request that never left the client.
    Other,
}

impl TransportCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportCode::NetworkUnreachable => "network_unreachable",
            TransportCode::ResourceExhausted => "resource_exhausted",
            TransportCode::TimedOut => "timed_out",
            TransportCode::Other => "other",
        }
    }
}

/// Failure of a single outbound request.
///
/// The executor hands this back to the caller exactly as the operation
/// produced it, so status and body stay inspectable.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Transport error ({}): {message}", code.as_str())]
    Transport { code: TransportCode, message: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request aborted")]
    Aborted,

    #[error("Response decode error: {0}")]
    Decode(String),
}

impl RequestError {
    /// HTTP status carried by this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 and 403 end retrying and start session recovery.
    pub fn is_auth_failure(&self) -> bool {
        self.failure_class() == FailureClass::Auth
    }
}

impl ClassifyFailure for RequestError {
    fn failure_class(&self) -> FailureClass {
        match self {
            RequestError::Network(_) => FailureClass::Network,
            RequestError::Transport { code, .. } => match code {
                TransportCode::NetworkUnreachable
                | TransportCode::ResourceExhausted
                | TransportCode::TimedOut => FailureClass::Network,
                TransportCode::Other => FailureClass::Terminal,
            },
            RequestError::Status { status, .. } => FailureClass::from_status(*status),
            RequestError::Aborted | RequestError::Decode(_) => FailureClass::Terminal,
        }
    }
}

impl Abortable for RequestError {
    fn aborted() -> Self {
        RequestError::Aborted
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            return RequestError::Transport {
                code: TransportCode::Other,
                message: e.to_string(),
            };
        }
        if e.is_timeout() {
            return RequestError::Transport {
                code: TransportCode::TimedOut,
                message: e.to_string(),
            };
        }
        if e.is_connect() {
            return RequestError::Transport {
                code: TransportCode::NetworkUnreachable,
                message: e.to_string(),
            };
        }
        if e.is_decode() {
            return RequestError::Decode(e.to_string());
        }
        match e.status() {
            Some(status) => RequestError::Status {
                status: status.as_u16(),
                body: String::new(),
            },
            None => RequestError::Network(e.to_string()),
        }
    }
}

impl From<std::io::Error> for RequestError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match e.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable
            | ErrorKind::BrokenPipe => TransportCode::NetworkUnreachable,
            ErrorKind::OutOfMemory => TransportCode::ResourceExhausted,
            ErrorKind::TimedOut => TransportCode::TimedOut,
            _ => TransportCode::Other,
        };
        RequestError::Transport {
            code,
            message: e.to_string(),
        }
    }
}

/// Why a bearer token could not be read. Never leaves `TokenInspector::decode`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("token is not a three-segment bearer token")]
    Malformed,

    #[error("claims segment is not valid base64url: {0}")]
    Base64(String),

    #[error("claims segment is not valid JSON: {0}")]
    Claims(String),

    #[error("claim `{0}` is not a valid timestamp")]
    InvalidTimestamp(&'static str),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid retry configuration: {0}")]
    InvalidRetryConfig(String),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Config rendering error: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        let status = |s: u16| RequestError::Status {
            status: s,
            body: String::new(),
        };

        assert_eq!(status(500).failure_class(), FailureClass::Server);
        assert_eq!(status(503).failure_class(), FailureClass::Server);
        assert_eq!(status(401).failure_class(), FailureClass::Auth);
        assert_eq!(status(403).failure_class(), FailureClass::Auth);
        assert_eq!(status(404).failure_class(), FailureClass::Client);
        assert_eq!(status(429).failure_class(), FailureClass::Client);
        assert!(status(403).is_auth_failure());
        assert!(!status(404).is_auth_failure());
    }

    #[test]
    fn test_transport_codes() {
        let transport = |code| RequestError::Transport {
            code,
            message: "boom".to_string(),
        };

        assert!(transport(TransportCode::NetworkUnreachable)
            .failure_class()
            .is_retryable());
        assert!(transport(TransportCode::ResourceExhausted)
            .failure_class()
            .is_retryable());
        assert!(transport(TransportCode::TimedOut).failure_class().is_retryable());
        assert!(!transport(TransportCode::Other).failure_class().is_retryable());
    }

    #[test]
    fn test_io_error_mapping() {
        let refused: RequestError =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(matches!(
            refused,
            RequestError::Transport {
                code: TransportCode::NetworkUnreachable,
                ..
            }
        ));

        let oom: RequestError =
            std::io::Error::new(std::io::ErrorKind::OutOfMemory, "oom").into();
        assert!(oom.failure_class().is_retryable());

        let denied: RequestError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(denied.failure_class(), FailureClass::Terminal);
    }

    #[test]
    fn test_aborted_is_terminal() {
        assert_eq!(RequestError::aborted().failure_class(), FailureClass::Terminal);
    }
}
