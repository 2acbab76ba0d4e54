//! Injected bearer-token capability.
//!
//! The clients never read credentials from ambient state. They are handed an
//! [`AuthProvider`], ask it for the current token before each call, and tell
//! it when the backend rejects that token.

use std::sync::{Mutex, PoisonError, RwLock};

/// Source of the bearer token used by the remote clients.
pub trait AuthProvider: Send + Sync {
    /// The current token, or `None` when the user is signed out.
    fn current_token(&self) -> Option<String>;

    /// Called when the backend answered 401/403 for the current token.
    fn expire(&self);
}

type ExpireCallback = Box<dyn Fn() + Send + Sync>;

/// In-memory token holder with expiry notifications.
#[derive(Default)]
pub struct TokenStore {
    token: RwLock<Option<String>>,
    on_expire: Mutex<Vec<ExpireCallback>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_token(token);
        store
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
    }

    /// Signs out locally without notifying expiry listeners.
    pub fn clear(&self) {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    /// Registers a callback run every time the token is expired.
    pub fn on_expire(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.on_expire
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }
}

impl AuthProvider for TokenStore {
    fn current_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn expire(&self) {
        self.clear();
        log::warn!("bearer token rejected by the backend; signing out");
        let callbacks = self.on_expire.lock().unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter() {
            callback();
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_token", &self.current_token().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn blank_token_counts_as_signed_out() {
        let store = TokenStore::with_token("   ");
        assert_eq!(store.current_token(), None);
        store.set_token("abc");
        assert_eq!(store.current_token().as_deref(), Some("abc"));
    }

    #[test]
    fn expire_clears_token_and_runs_callbacks() {
        let store = TokenStore::with_token("abc");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        store.on_expire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.expire();

        assert_eq!(store.current_token(), None);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_does_not_notify() {
        let store = TokenStore::with_token("abc");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        store.on_expire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.clear();

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
