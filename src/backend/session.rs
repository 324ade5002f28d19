//! In-process session slot and auth-event fan-out.
//!
//! The session is the only mutable state the gateway carries: a network
//! credential with client lifetime, not a cache of remote rows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::models::Session;

/// Auth state transition reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

type Callback = Box<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

/// Shared slot holding the current session, if any.
#[derive(Default)]
pub struct SessionHandle {
    inner: RwLock<Option<Session>>,
}

impl SessionHandle {
    pub fn get(&self) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub fn set(&self, session: Option<Session>) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = session;
    }
}

struct EventsInner {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Callback>>,
}

/// Registry of auth-state listeners.
///
/// Cloning shares the registry; every authenticator holds one and emits on
/// each transition it performs.
#[derive(Clone)]
pub struct AuthEvents {
    inner: Arc<EventsInner>,
}

impl AuthEvents {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EventsInner {
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a listener; it stays active until the returned handle is
    /// dropped or `unsubscribe`d.
    pub fn subscribe(&self, callback: Callback) -> AuthSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, callback);
        AuthSubscription {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    pub(crate) fn emit(&self, event: AuthEvent, session: Option<&Session>) {
        let listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for callback in listeners.values() {
            callback(event, session);
        }
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `on_auth_state_change`; deregisters on drop.
pub struct AuthSubscription {
    id: u64,
    inner: Arc<EventsInner>,
}

impl AuthSubscription {
    /// Explicitly stop receiving auth events.
    pub fn unsubscribe(self) {}
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_subscriber_until_unsubscribed() {
        let events = AuthEvents::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let subscription = events.subscribe(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        events.emit(AuthEvent::SignedIn, None);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        events.emit(AuthEvent::SignedOut, None);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_deregisters() {
        let events = AuthEvents::new();
        let seen = Arc::new(AtomicUsize::new(0));

        {
            let counter = Arc::clone(&seen);
            let _subscription = events.subscribe(Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        events.emit(AuthEvent::TokenRefreshed, None);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
