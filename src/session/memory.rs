// In-process session collaborators
// Author: kelexine (https://github.com/kelexine)

use super::cookies::{CookieExpiry, CookieScope};
use super::{CookieJar, KeyValueStorage, Navigator, SessionStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// In-memory user store, keyed by field name.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    fields: Mutex<HashMap<String, Value>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.fields.lock().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.fields.lock().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.lock().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn reset(&self) -> anyhow::Result<()> {
        self.fields.lock().clear();
        debug!("Session store reset");
        Ok(())
    }
}

/// Named in-memory key/value storage.
#[derive(Debug)]
pub struct MemoryStorage {
    name: String,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        debug!("Cleared {} entries from {} storage", removed, self.name);
        Ok(())
    }
}

/// Cookie jar keyed by name and scope. Records every deletion header it
/// would have sent.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<BTreeMap<(String, CookieScope), String>>,
    issued: Mutex<Vec<String>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, scope: CookieScope, value: impl Into<String>) {
        self.cookies
            .lock()
            .insert((name.into(), scope), value.into());
    }

    pub fn get(&self, name: &str, scope: &CookieScope) -> Option<String> {
        self.cookies
            .lock()
            .get(&(name.to_string(), scope.clone()))
            .cloned()
    }

    /// Current cookies, ordered by name then scope.
    pub fn snapshot(&self) -> BTreeMap<(String, CookieScope), String> {
        self.cookies.lock().clone()
    }

    /// `Set-Cookie` values emitted so far.
    pub fn issued_headers(&self) -> Vec<String> {
        self.issued.lock().clone()
    }
}

#[async_trait]
impl CookieJar for MemoryCookieJar {
    async fn expire(&self, cookie: &CookieExpiry) -> anyhow::Result<()> {
        self.cookies
            .lock()
            .remove(&(cookie.name.clone(), cookie.scope.clone()));
        self.issued.lock().push(cookie.header_value());
        Ok(())
    }
}

/// A navigation that was performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Client(String),
    Hard(String),
}

/// Navigator that logs and records each navigation.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<Navigation> {
        self.visits.lock().clone()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, path: &str) -> anyhow::Result<()> {
        info!("Navigating to {}", path);
        self.visits.lock().push(Navigation::Client(path.to_string()));
        Ok(())
    }

    async fn hard_navigate(&self, path: &str) -> anyhow::Result<()> {
        info!("Reloading at {}", path);
        self.visits.lock().push(Navigation::Hard(path.to_string()));
        Ok(())
    }
}
