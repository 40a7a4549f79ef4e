// Session cookie expiry directives
// Author: kelexine (https://github.com/kelexine)

use std::fmt;

/// Cookie names owned by the session provider (session, CSRF, callback).
pub const DEFAULT_COOKIE_NAMES: &[&str] = &[
    "next-auth.session-token",
    "next-auth.csrf-token",
    "next-auth.callback-url",
    "__Secure-next-auth.session-token",
    "__Secure-next-auth.callback-url",
    "__Host-next-auth.csrf-token",
];

/// Explicit domains each cookie is also expired under, next to the
/// host-only scope.
pub const DEFAULT_COOKIE_DOMAINS: &[&str] = &["localhost", ".localhost"];

/// `Expires` value used for deletion.
pub const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Domain scope a cookie was set under. Deleting a cookie only works when
/// the scope matches the one it was set with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CookieScope {
    /// No `Domain` attribute.
    HostOnly,
    Domain(String),
}

/// One deletion directive: an empty, already-expired cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieExpiry {
    pub name: String,
    pub scope: CookieScope,
    pub path: String,
}

impl CookieExpiry {
    pub fn new(name: impl Into<String>, scope: CookieScope) -> Self {
        Self {
            name: name.into(),
            scope,
            path: "/".to_string(),
        }
    }

    /// Value for a `Set-Cookie` header.
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CookieExpiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=; Path={}; ", self.name, self.path)?;
        if let CookieScope::Domain(domain) = &self.scope {
            write!(f, "Domain={}; ", domain)?;
        }
        write!(f, "Expires={}; Max-Age=0", EPOCH_HTTP_DATE)
    }
}

/// Expands every cookie name into one directive per scope: host-only first,
/// then each explicit domain. Blank and duplicate domains are skipped.
pub fn expiry_directives<N, D>(names: &[N], domains: &[D]) -> Vec<CookieExpiry>
where
    N: AsRef<str>,
    D: AsRef<str>,
{
    let mut scopes = vec![CookieScope::HostOnly];
    for domain in domains {
        let domain = domain.as_ref().trim();
        if domain.is_empty() {
            continue;
        }
        let scope = CookieScope::Domain(domain.to_string());
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }

    names
        .iter()
        .map(|name| name.as_ref().trim())
        .filter(|name| !name.is_empty())
        .flat_map(|name| {
            scopes
                .iter()
                .map(move |scope| CookieExpiry::new(name, scope.clone()))
        })
        .collect()
}
