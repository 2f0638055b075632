//! Process-wide session store
//!
//! Explicitly owned holder of the current authenticated session.
//! Written only through [`SessionStore::publish`] (the auth manager's
//! notification channel); read by any component. Subscribers are kept
//! for the lifetime of the store.

use crate::auth::types::AuthSession;
use log::debug;
use std::sync::{Arc, Mutex};

/// Auth state change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// Fired once synchronously at subscribe time with the current state
    Initial,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

type Subscriber = Arc<dyn Fn(AuthEvent, Option<&AuthSession>) + Send + Sync>;

/// Holder of the current authenticated session
#[derive(Default)]
pub struct SessionStore {
    session: Mutex<Option<AuthSession>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session, if any. Absence is a normal state, not an error.
    pub fn current(&self) -> Option<AuthSession> {
        self.session.lock().unwrap().clone()
    }

    /// User id of the current session, if signed in
    pub fn user_id(&self) -> Option<String> {
        self.current().map(|session| session.user.id)
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }

    /// Register a state-change callback.
    ///
    /// Fires once synchronously with the current state before any
    /// subsequent notification, so a late subscriber still sees a
    /// restored session.
    pub fn subscribe(
        &self,
        callback: impl Fn(AuthEvent, Option<&AuthSession>) + Send + Sync + 'static,
    ) {
        let current = self.current();
        callback(AuthEvent::Initial, current.as_ref());
        self.subscribers.lock().unwrap().push(Arc::new(callback));
    }

    /// Replace the held session and notify all subscribers.
    ///
    /// Callbacks run outside both locks, so a subscriber may call back
    /// into the store (read the session, subscribe, or publish again).
    pub fn publish(&self, event: AuthEvent, session: Option<AuthSession>) {
        debug!(
            "Session store update: {:?} (signed in: {})",
            event,
            session.is_some()
        );
        {
            let mut held = self.session.lock().unwrap();
            *held = session.clone();
        }
        let snapshot: Vec<Subscriber> = self.subscribers.lock().unwrap().clone();
        for subscriber in snapshot.iter() {
            subscriber(event, session.as_ref());
        }
    }
}
