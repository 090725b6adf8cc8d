//! Callback registries fired after registration and activation.
//!
//! A [`Signal`] owns a list of listeners. `connect` returns a [`ListenerId`] that can be
//! passed to `disconnect`; `send` invokes every listener connected at the time of the
//! call and returns how many were notified.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use super::models::User;

/// Details of the HTTP request (or CLI invocation) that triggered a signal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            ..Self::default()
        }
    }
}

/// Sent after a new account has been stored.
#[derive(Clone, Debug)]
pub struct UserRegistered {
    pub user: User,
    pub request: RequestContext,
}

/// Sent once per successful activation.
#[derive(Clone, Debug)]
pub struct UserActivated {
    pub user: User,
    pub request: RequestContext,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub struct Signal<E> {
    name: &'static str,
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Listener<E>)>>,
}

impl<E> std::fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("listeners", &self.len())
            .finish()
    }
}

impl<E> Signal<E> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not connected.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn send(&self, event: &E) -> usize {
        // Snapshot so listeners may connect/disconnect without deadlocking.
        let listeners: Vec<Listener<E>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(event);
        }

        debug!(signal = self.name, receivers = listeners.len(), "signal sent");
        listeners.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The signals a [`Registrar`](super::Registrar) fires.
#[derive(Debug)]
pub struct Signals {
    pub user_registered: Signal<UserRegistered>,
    pub user_activated: Signal<UserActivated>,
}

impl Signals {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_registered: Signal::new("user_registered"),
            user_activated: Signal::new("user_activated"),
        }
    }
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}
