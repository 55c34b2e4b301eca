//! The session registry: every live session, keyed by id.
//!
//! # Concurrency
//!
//! Unlike a [`Session`], the registry IS safe to share. All sessions sit
//! behind one `tokio::sync::Mutex`, so:
//! - two inserts of the same id can't both win
//! - an answer and a stop on the same session can't interleave
//! - a reader never sees a half-scored answer
//!
//! Callers outside the lock only ever get a [`SessionView`] (a copy),
//! never a reference into the map.
//!
//! # Expiry
//!
//! Nothing runs in the background. A session whose budget has run out is
//! noticed the next time anyone touches it ([`get`](SessionRegistry::get),
//! [`update`](SessionRegistry::update)), or in bulk by
//! [`drain_expired`](SessionRegistry::drain_expired). Either way it is
//! finished at its deadline, removed, and its final snapshot handed back
//! so the caller can persist the result.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{Session, SessionError, SessionId, SessionView};

/// Holds all active sessions.
///
/// ## Lifecycle
///
/// ```text
/// put() ──→ [Active] ──update()──→ [Active] ...
///              │                      │
///              │ budget spent / stop  │
///              ▼                      ▼
///          [Finished] ──→ removed, final SessionView returned
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under its own id.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyExists`] if the id is taken. The
    /// existing session is left untouched.
    pub async fn put(&self, session: Session) -> Result<(), SessionError> {
        let id = session.id();
        let mut sessions = self.sessions.lock().await;

        match sessions.entry(id) {
            Entry::Occupied(_) => Err(SessionError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                tracing::info!(
                    session_id = %id,
                    user_id = %session.user_id(),
                    "session registered"
                );
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Returns a snapshot of the session as of `now`.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: no such session
    /// - [`SessionError::Expired`]: the budget ran out; the session has
    ///   been removed and its final snapshot is in the error
    pub async fn get(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<SessionView, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session =
            sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;

        if session.expire_if_due(now) {
            let view = session.view();
            sessions.remove(&id);
            tracing::info!(session_id = %id, "expired session evicted on read");
            return Err(SessionError::Expired(Box::new(view)));
        }

        Ok(session.view())
    }

    /// Runs `f` on the session while holding the lock.
    ///
    /// Expiry is checked first: if the budget ran out before `now`, `f`
    /// never runs and [`SessionError::Expired`] comes back instead. If the
    /// session is finished once `f` returns (e.g. `f` stopped it, or an
    /// answer spent the budget), it is removed from the registry.
    ///
    /// `f` must not block; everyone else waits on the same lock.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] / [`SessionError::Expired`], converted
    ///   into `E`
    /// - whatever `f` returns
    pub async fn update<T, E, F>(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut Session) -> Result<T, E>,
        E: From<SessionError>,
    {
        let mut sessions = self.sessions.lock().await;
        let session =
            sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;

        if session.expire_if_due(now) {
            let view = session.view();
            sessions.remove(&id);
            tracing::info!(session_id = %id, "expired session evicted on update");
            return Err(SessionError::Expired(Box::new(view)).into());
        }

        let result = f(session);

        let finished = session.is_finished();
        if finished {
            sessions.remove(&id);
            tracing::debug!(session_id = %id, "finished session removed");
        }

        result
    }

    /// Removes a session, returning it if it was there.
    pub async fn delete(&self, id: SessionId) -> Option<Session> {
        let removed = self.sessions.lock().await.remove(&id);
        if removed.is_some() {
            tracing::debug!(session_id = %id, "session deleted");
        }
        removed
    }

    /// Finishes and removes every session whose budget ran out by `now`.
    ///
    /// Returns the final snapshot of each one, so the caller can persist
    /// them.
    pub async fn drain_expired(&self, now: DateTime<Utc>) -> Vec<SessionView> {
        let mut sessions = self.sessions.lock().await;
        let mut expired = Vec::new();

        // `retain` with a side channel: collect the views of what we drop.
        sessions.retain(|_, session| {
            if session.expire_if_due(now) {
                expired.push(session.view());
                false
            } else {
                true
            }
        });

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired sessions drained");
        }
        expired
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
