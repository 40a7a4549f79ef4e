//! Client session state and its recovery after an authentication failure.
//!
//! # Submodules
//!
//! - `token`: memoized decoding of the active bearer token.
//! - `guard`: the `SessionGuard`, which tears session state down exactly
//!   once per invalidation episode.
//! - `cookies`: deletion directives for session cookies.
//! - `memory`: in-process implementations of the collaborator traits.
//! - `provider`: HTTP sign-out against the session provider.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod cookies;
mod guard;
pub mod memory;
pub mod provider;
pub mod token;

pub use cookies::{expiry_directives, CookieExpiry, CookieScope};
pub use guard::{
    SessionGuard, SignalOutcome, StepFailure, TeardownCollaborators, TeardownReport,
    TeardownSettings, TeardownState, TeardownStep,
};
pub use token::{decode_claims, DecodedSession, InspectorStats, TokenInspector};

use async_trait::async_trait;
use serde::Serialize;

/// In-memory user/session store owned by the application.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the store to its empty, signed-out state.
    async fn reset(&self) -> anyhow::Result<()>;
}

/// Client-side persisted key/value storage.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &str;

    /// Removes every key.
    async fn clear(&self) -> anyhow::Result<()>;
}

/// Sink for cookie deletion directives.
#[async_trait]
pub trait CookieJar: Send + Sync {
    async fn expire(&self, cookie: &CookieExpiry) -> anyhow::Result<()>;
}

/// Options passed to the session provider on sign-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignOutOptions {
    /// Whether the provider may navigate on its own. Always `false` from the
    /// guard, which performs navigation itself.
    pub redirect: bool,
}

impl Default for SignOutOptions {
    fn default() -> Self {
        Self { redirect: false }
    }
}

/// External session provider (the party that issued the session).
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn sign_out(&self, options: SignOutOptions) -> anyhow::Result<()>;
}

/// Navigation collaborator.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Client-side navigation to an absolute path.
    async fn navigate(&self, path: &str) -> anyhow::Result<()>;

    /// Full reload at `path`, used when the graceful path failed.
    async fn hard_navigate(&self, path: &str) -> anyhow::Result<()>;
}
