//! Request-scoped session handle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cookie::Cookie;

use crate::crypto::CryptoError;
use crate::session::data::{now_secs, SessionData};
use crate::session::store::CookieSessionStore;
use crate::session::value::Value;

/// What [`Session::commit`] decided to send back.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Nothing changed; no cookie is written.
    Skipped,
    /// Re-encrypted session cookie.
    Saved(Cookie<'static>),
    /// Session was cleared and is empty; cookie removal.
    Deleted(Cookie<'static>),
}

impl CommitOutcome {
    pub fn cookie(&self) -> Option<&Cookie<'static>> {
        match self {
            CommitOutcome::Skipped => None,
            CommitOutcome::Saved(c) | CommitOutcome::Deleted(c) => Some(c),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CommitOutcome::Skipped => "skipped",
            CommitOutcome::Saved(_) => "saved",
            CommitOutcome::Deleted(_) => "deleted",
        }
    }
}

/// A session owned by one request.
///
/// Every mutation marks the session dirty; only dirty sessions are written
/// back on commit.
pub struct Session {
    data: SessionData,
    store: Arc<CookieSessionStore>,
    dirty: bool,
    cleared: bool,
}

impl Session {
    pub fn new(data: SessionData, store: Arc<CookieSessionStore>) -> Self {
        Self {
            data,
            store,
            dirty: false,
            cleared: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.data.insert(key.into(), value.into());
        self.dirty = true;
    }

    pub fn delete(&mut self, key: &str) {
        self.data.data.remove(key);
        self.dirty = true;
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.data.contains_key(key)
    }

    pub fn all(&self) -> &BTreeMap<String, Value> {
        &self.data.data
    }

    /// Drop all values and flash messages.
    pub fn clear(&mut self) {
        self.data.data.clear();
        self.data.flash.clear();
        self.cleared = true;
        self.dirty = true;
    }

    /// Queue a one-shot message.
    pub fn flash(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.data.flash.insert(key.into(), message.into());
        self.dirty = true;
    }

    /// Read and remove a flash message.
    pub fn get_flash(&mut self, key: &str) -> Option<String> {
        let message = self.data.flash.remove(key);
        if message.is_some() {
            self.dirty = true;
        }
        message
    }

    /// Read and remove all flash messages.
    pub fn get_all_flash(&mut self) -> BTreeMap<String, String> {
        if self.data.flash.is_empty() {
            return BTreeMap::new();
        }
        self.dirty = true;
        std::mem::take(&mut self.data.flash)
    }

    pub fn has_flash(&self) -> bool {
        !self.data.flash.is_empty()
    }

    /// Push the expiry out to `max_age` from now.
    pub fn regenerate(&mut self, max_age: Duration) {
        self.data.expires_at = now_secs().saturating_add(max_age.as_secs());
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Write the session back if it changed.
    pub fn commit(&self) -> Result<CommitOutcome, CryptoError> {
        if !self.dirty {
            return Ok(CommitOutcome::Skipped);
        }
        if self.cleared && self.data.is_empty() {
            return Ok(CommitOutcome::Deleted(self.store.clear()));
        }
        self.store.save(&self.data).map(CommitOutcome::Saved)
    }
}

/// Shared access to the request's [`Session`], placed in request extensions.
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().expect("session mutex poisoned")
    }
}
