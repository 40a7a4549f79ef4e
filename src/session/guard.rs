//! Idempotent session teardown.
//!
//! The `SessionGuard` owns the only mutable process-wide state of the
//! recovery layer: whether a teardown episode is running. A signal claims the
//! episode with a compare-and-set before anything is awaited, so any number
//! of requests failing together produce exactly one teardown. Signals that
//! arrive while an episode runs are dropped. Once the sequence finishes,
//! whatever its individual steps reported, the guard is idle again and the
//! next signal starts a fresh episode.

// Author: kelexine (https://github.com/kelexine)

use super::cookies::{
    expiry_directives, CookieExpiry, DEFAULT_COOKIE_DOMAINS, DEFAULT_COOKIE_NAMES,
};
use super::token::TokenInspector;
use super::{CookieJar, KeyValueStorage, Navigator, SessionProvider, SessionStore, SignOutOptions};
use crate::events::{AuthEvent, AuthEventBus, AuthEventListener, UnauthorizedSink};
use anyhow::Context;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Target of the last-resort reload.
pub const ROOT_PATH: &str = "/";

/// What a teardown clears and where it sends the user afterwards.
#[derive(Debug, Clone)]
pub struct TeardownSettings {
    pub home_path: String,
    pub cookies: Vec<CookieExpiry>,
}

impl Default for TeardownSettings {
    fn default() -> Self {
        Self {
            home_path: ROOT_PATH.to_string(),
            cookies: expiry_directives(DEFAULT_COOKIE_NAMES, DEFAULT_COOKIE_DOMAINS),
        }
    }
}

/// Everything a teardown touches outside the guard.
#[derive(Clone)]
pub struct TeardownCollaborators {
    pub session_store: Arc<dyn SessionStore>,
    /// Every persisted store; all of them are wiped.
    pub storages: Vec<Arc<dyn KeyValueStorage>>,
    pub cookie_jar: Arc<dyn CookieJar>,
    pub provider: Arc<dyn SessionProvider>,
    pub navigator: Arc<dyn Navigator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownState {
    Idle,
    TearingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    ResetSessionStore,
    ClearStorage,
    ExpireCookies,
    SignOut,
    NavigateHome,
    HardNavigate,
}

impl TeardownStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownStep::ResetSessionStore => "reset_session_store",
            TeardownStep::ClearStorage => "clear_storage",
            TeardownStep::ExpireCookies => "expire_cookies",
            TeardownStep::SignOut => "sign_out",
            TeardownStep::NavigateHome => "navigate_home",
            TeardownStep::HardNavigate => "hard_navigate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step: TeardownStep,
    pub message: String,
}

/// What happened during one episode.
#[derive(Debug, Clone)]
pub struct TeardownReport {
    pub episode_id: Uuid,
    pub failures: Vec<StepFailure>,
    /// Whether sign-out or navigation failed and a reload at `/` was issued.
    pub used_fallback: bool,
}

impl TeardownReport {
    fn new(episode_id: Uuid) -> Self {
        Self {
            episode_id,
            failures: Vec::new(),
            used_fallback: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, step: TeardownStep) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }

    /// Logs and keeps a failed step; never propagates it.
    fn record(&mut self, step: TeardownStep, result: anyhow::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(step = step.as_str(), "Teardown step failed: {:#}", e);
                crate::metrics::record_teardown_step_failure(step.as_str());
                self.failures.push(StepFailure {
                    step,
                    message: format!("{:#}", e),
                });
                false
            }
        }
    }
}

/// Result of `SessionGuard::signal_unauthorized`.
#[derive(Debug)]
pub enum SignalOutcome {
    /// This signal started an episode; the handle yields its report.
    Started(JoinHandle<TeardownReport>),
    /// An episode was already running (or could not be scheduled).
    Dropped,
}

impl SignalOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, SignalOutcome::Started(_))
    }
}

struct GuardInner {
    in_progress: AtomicBool,
    completed: AtomicU64,
    attached: AtomicBool,
    idle: Notify,
    settings: TeardownSettings,
    collaborators: TeardownCollaborators,
    inspector: Arc<TokenInspector>,
}

/// Injectable owner of the teardown state. Cheap to clone; clones share it.
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<GuardInner>,
}

impl SessionGuard {
    pub fn new(
        settings: TeardownSettings,
        collaborators: TeardownCollaborators,
        inspector: Arc<TokenInspector>,
    ) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                in_progress: AtomicBool::new(false),
                completed: AtomicU64::new(0),
                attached: AtomicBool::new(false),
                idle: Notify::new(),
                settings,
                collaborators,
                inspector,
            }),
        }
    }

    pub fn state(&self) -> TeardownState {
        if self.inner.in_progress.load(Ordering::Acquire) {
            TeardownState::TearingDown
        } else {
            TeardownState::Idle
        }
    }

    /// Number of episodes that ran to completion.
    pub fn completed_episodes(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    pub fn inspector(&self) -> &Arc<TokenInspector> {
        &self.inner.inspector
    }

    pub fn settings(&self) -> &TeardownSettings {
        &self.inner.settings
    }

    fn try_begin(&self) -> Option<Episode> {
        self.inner
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Episode {
                inner: Arc::clone(&self.inner),
                id: Uuid::new_v4(),
            })
    }

    /// Claims a teardown episode and runs it in the background.
    ///
    /// The claim happens synchronously in this call. Must be called from
    /// within a tokio runtime; otherwise the signal is dropped.
    pub fn signal_unauthorized(&self) -> SignalOutcome {
        let Some(episode) = self.try_begin() else {
            debug!("Session teardown already running; dropping unauthorized signal");
            crate::metrics::record_teardown_signal("dropped");
            return SignalOutcome::Dropped;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                crate::metrics::record_teardown_signal("started");
                SignalOutcome::Started(runtime.spawn(episode.run()))
            }
            Err(e) => {
                error!("Cannot schedule session teardown: {}", e);
                crate::metrics::record_teardown_signal("dropped");
                SignalOutcome::Dropped
            }
        }
    }

    /// Claims and runs an episode on the current task.
    /// Returns `None` if one was already running.
    pub async fn recover(&self) -> Option<TeardownReport> {
        match self.try_begin() {
            Some(episode) => {
                crate::metrics::record_teardown_signal("started");
                Some(episode.run().await)
            }
            None => {
                crate::metrics::record_teardown_signal("dropped");
                None
            }
        }
    }

    /// Resolves once no episode is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.inner.in_progress.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    /// Registers this guard on `bus`. Only the first call has an effect.
    pub fn attach(&self, bus: &AuthEventBus) -> bool {
        if self.inner.attached.swap(true, Ordering::AcqRel) {
            warn!("Session guard is already attached to an event bus");
            return false;
        }
        bus.register(Arc::new(self.clone()));
        true
    }
}

impl AuthEventListener for SessionGuard {
    fn on_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::Unauthorized => {
                let _ = self.signal_unauthorized();
            }
        }
    }
}

impl UnauthorizedSink for SessionGuard {
    fn report_unauthorized(&self) {
        let _ = self.signal_unauthorized();
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("state", &self.state())
            .field("completed_episodes", &self.completed_episodes())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

/// A claimed episode. Dropping it returns the guard to `Idle`.
struct Episode {
    inner: Arc<GuardInner>,
    id: Uuid,
}

impl Episode {
    async fn run(self) -> TeardownReport {
        let span = tracing::info_span!("session_teardown", episode = %self.id);
        let report = self.inner.teardown(self.id).instrument(span).await;
        self.inner.completed.fetch_add(1, Ordering::AcqRel);
        report
    }
}

impl Drop for Episode {
    fn drop(&mut self) {
        self.inner.in_progress.store(false, Ordering::Release);
        self.inner.idle.notify_waiters();
    }
}

impl GuardInner {
    async fn teardown(&self, episode_id: Uuid) -> TeardownReport {
        let mut report = TeardownReport::new(episode_id);
        let c = &self.collaborators;

        warn!("Session rejected; clearing client session state");

        // 1. In-memory session state
        self.inspector.clear();
        report.record(
            TeardownStep::ResetSessionStore,
            guarded(c.session_store.reset()).await,
        );

        // 2. Persisted storage
        for storage in &c.storages {
            let result = guarded(storage.clear())
                .await
                .with_context(|| format!("storage `{}`", storage.name()));
            report.record(TeardownStep::ClearStorage, result);
        }

        // 3. Cookies, once per scope
        for cookie in &self.settings.cookies {
            let result = guarded(c.cookie_jar.expire(cookie))
                .await
                .with_context(|| format!("cookie `{}` ({:?})", cookie.name, cookie.scope));
            report.record(TeardownStep::ExpireCookies, result);
        }

        // 4. + 5. Provider sign-out, then our own navigation
        let signed_out = report.record(
            TeardownStep::SignOut,
            guarded(c.provider.sign_out(SignOutOptions::default())).await,
        );
        let navigated = report.record(
            TeardownStep::NavigateHome,
            guarded(c.navigator.navigate(&self.settings.home_path)).await,
        );

        if !(signed_out && navigated) {
            report.used_fallback = true;
            warn!("Graceful sign-out incomplete; reloading at {}", ROOT_PATH);
            report.record(
                TeardownStep::HardNavigate,
                guarded(c.navigator.hard_navigate(ROOT_PATH)).await,
            );
        }

        info!(
            failures = report.failures.len(),
            fallback = report.used_fallback,
            "Session teardown complete"
        );
        report
    }
}

/// Turns a panicking step into an ordinary failure.
async fn guarded<F>(step: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("step panicked")),
    }
}
