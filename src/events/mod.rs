//! Application-scoped authentication event bus.
//!
//! The bus is created once per application instance and handed to whoever
//! needs it; there is no global registration. Synchronous listeners run
//! inside `publish`, in registration order, so a listener such as the
//! `SessionGuard` can flip its state before the publisher continues. Async
//! observers (UI redirect, toast) `subscribe` to a broadcast channel instead.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Well-known name of the unauthorized signal.
pub const UNAUTHORIZED_EVENT: &str = "unauthorizedError";

const CHANNEL_CAPACITY: usize = 16;

/// Payload-free authentication events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    Unauthorized,
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::Unauthorized => UNAUTHORIZED_EVENT,
        }
    }
}

/// Receives events synchronously from `AuthEventBus::publish`.
pub trait AuthEventListener: Send + Sync {
    fn on_auth_event(&self, event: AuthEvent);
}

/// Where the HTTP layer reports a terminal 401/403.
pub trait UnauthorizedSink: Send + Sync {
    fn report_unauthorized(&self);
}

pub struct AuthEventBus {
    listeners: RwLock<Vec<Arc<dyn AuthEventListener>>>,
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            listeners: RwLock::new(Vec::new()),
            sender,
        }
    }

    pub fn register(&self, listener: Arc<dyn AuthEventListener>) {
        self.listeners.write().push(listener);
    }

    /// Subscribe to events as an async observer.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Delivers `event` to every listener, then to subscribers.
    /// Returns the number of synchronous listeners notified.
    pub fn publish(&self, event: AuthEvent) -> usize {
        // Snapshot so a listener may register others without deadlocking.
        let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
        for listener in &listeners {
            listener.on_auth_event(event);
        }

        // No subscribers is not an error.
        let observers = self.sender.send(event).unwrap_or(0);
        debug!(
            "Published {} to {} listeners and {} observers",
            event.name(),
            listeners.len(),
            observers
        );
        crate::metrics::record_auth_event(event.name());

        listeners.len()
    }
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl UnauthorizedSink for AuthEventBus {
    fn report_unauthorized(&self) {
        self.publish(AuthEvent::Unauthorized);
    }
}

impl std::fmt::Debug for AuthEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEventBus")
            .field("listeners", &self.listeners.read().len())
            .field("observers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl AuthEventListener for Counter {
        fn on_auth_event(&self, _event: AuthEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_publish_reaches_every_listener() {
        let bus = AuthEventBus::new();
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());
        bus.register(first.clone());
        bus.register(second.clone());

        assert_eq!(bus.publish(AuthEvent::Unauthorized), 2);
        bus.report_unauthorized();

        assert_eq!(first.0.load(Ordering::SeqCst), 2);
        assert_eq!(second.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = AuthEventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(AuthEvent::Unauthorized);

        let event = rx.recv().await.unwrap();
        assert_eq!(event, AuthEvent::Unauthorized);
        assert_eq!(event.name(), "unauthorizedError");
    }

    #[test]
    fn test_publish_without_anyone_listening() {
        let bus = AuthEventBus::default();
        assert_eq!(bus.publish(AuthEvent::Unauthorized), 0);
    }
}
