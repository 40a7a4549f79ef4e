//! Bearer token inspection.
//!
//! `TokenInspector` reads the claims embedded in the active session token and
//! memoizes the result against the raw token string. Nothing here verifies a
//! signature: the decoded claims are hints for the client (who is signed in,
//! which role, when the session ends) and must never be used to make an
//! authorization decision.

// Author: kelexine (https://github.com/kelexine)

use crate::error::DecodeError;
use crate::utils::logging::token_fingerprint;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroize;

/// Claims of the active session, derived from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedSession {
    pub subject_id: String,
    pub role_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DecodedSession {
    /// Check if the session is expired or will expire within buffer seconds
    pub fn is_expired(&self, buffer_seconds: i64) -> bool {
        self.expires_in_seconds() < buffer_seconds
    }

    /// Get remaining time until expiry in seconds
    pub fn expires_in_seconds(&self) -> i64 {
        self.expires_at.timestamp() - Utc::now().timestamp()
    }
}

#[derive(Deserialize)]
struct Claims {
    id: SubjectId,
    role_id: i64,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubjectId {
    Text(String),
    Number(i64),
}

impl SubjectId {
    fn into_string(self) -> String {
        match self {
            SubjectId::Text(s) => s,
            SubjectId::Number(n) => n.to_string(),
        }
    }
}

/// Decodes the claims segment of a `header.claims.signature` token.
pub fn decode_claims(raw: &str) -> Result<DecodedSession, DecodeError> {
    let mut segments = raw.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(DecodeError::Malformed);
    };

    if payload.is_empty() {
        return Err(DecodeError::Malformed);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    let claims: Claims =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Claims(e.to_string()))?;

    Ok(DecodedSession {
        subject_id: claims.id.into_string(),
        role_id: claims.role_id,
        issued_at: timestamp(claims.iat, "iat")?,
        expires_at: timestamp(claims.exp, "exp")?,
    })
}

fn timestamp(seconds: i64, claim: &'static str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp(seconds, 0).ok_or(DecodeError::InvalidTimestamp(claim))
}

#[derive(Zeroize)]
#[zeroize(drop)]
struct RawToken(String);

/// The single cached token and what it decoded to.
struct TokenCacheEntry {
    raw: RawToken,
    session: DecodedSession,
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InspectorStats {
    /// Calls answered from the cache.
    pub hits: u64,
    /// Successful decodes of a token not seen before.
    pub decodes: u64,
    /// Tokens that could not be decoded.
    pub failures: u64,
}

#[derive(Default)]
struct InspectorState {
    entry: Option<TokenCacheEntry>,
    stats: InspectorStats,
}

/// Memoizing decoder for the single active session token.
#[derive(Default)]
pub struct TokenInspector {
    state: Mutex<InspectorState>,
}

impl TokenInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the claims of `raw`, or `None` if there is no usable session.
    ///
    /// A repeated token is served from the cache. A new token replaces the
    /// cache entry. An absent or malformed token empties it.
    pub fn decode(&self, raw: Option<&str>) -> Option<DecodedSession> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(raw) = raw else {
            if state.entry.take().is_some() {
                debug!("No session token present; cleared cached claims");
            }
            return None;
        };

        if let Some(entry) = &state.entry {
            if entry.raw.0 == raw {
                state.stats.hits += 1;
                crate::metrics::record_token_cache("hit");
                return Some(entry.session.clone());
            }
        }

        match decode_claims(raw) {
            Ok(session) => {
                state.stats.decodes += 1;
                crate::metrics::record_token_cache("decode");
                debug!(
                    token = %token_fingerprint(raw),
                    subject = %session.subject_id,
                    "Decoded new session token"
                );
                state.entry = Some(TokenCacheEntry {
                    raw: RawToken(raw.to_string()),
                    session: session.clone(),
                });
                Some(session)
            }
            Err(e) => {
                state.stats.failures += 1;
                state.entry = None;
                crate::metrics::record_token_cache("failure");
                debug!(token = %token_fingerprint(raw), "Discarding unreadable token: {}", e);
                None
            }
        }
    }

    /// Claims currently cached, without touching the counters.
    pub fn cached(&self) -> Option<DecodedSession> {
        self.state
            .lock()
            .entry
            .as_ref()
            .map(|entry| entry.session.clone())
    }

    /// Drops the cached entry.
    pub fn clear(&self) {
        self.state.lock().entry = None;
    }

    pub fn stats(&self) -> InspectorStats {
        self.state.lock().stats
    }
}

// Never prints the raw token
impl std::fmt::Debug for TokenInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TokenInspector")
            .field("cached", &state.entry.as_ref().map(|e| &e.session))
            .field("stats", &state.stats)
            .finish()
    }
}
