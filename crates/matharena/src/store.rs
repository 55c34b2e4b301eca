//! The persistent store boundary.
//!
//! Matharena doesn't keep finished games itself. It hands two events to a
//! [`SessionStore`]: "a session started" (the store answers with the id to
//! use) and "a session finished" (with the final score). What the store
//! does with them (a SQL table, a KV bucket, nothing) is up to it.
//!
//! [`InMemorySessionStore`] is the reference implementation, used by the
//! demo and the tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use matharena_session::{SessionId, SessionView, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Errors a [`SessionStore`] can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store doesn't know this user.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// There is no start record for this session.
    #[error("no record for session {0}")]
    RecordNotFound(SessionId),

    /// The session's finish was already recorded.
    #[error("session {0} already recorded as finished")]
    AlreadyRecorded(SessionId),

    /// Anything else the backend wants to report.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// The final result of a session, as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub score: u32,
}

impl FinishedSession {
    /// Builds the record from a final snapshot. `None` if the snapshot
    /// isn't of a finished session.
    pub fn from_view(view: &SessionView) -> Option<Self> {
        Some(Self {
            id: view.id,
            user_id: view.user_id,
            started_at: view.started_at,
            finished_at: view.finished_at?,
            score: view.score,
        })
    }
}

/// Records session starts and finishes somewhere durable.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because one store is shared by every request
/// the service handles, for as long as the service lives.
///
/// # Example
///
/// ```rust
/// use chrono::{DateTime, Utc};
/// use matharena::{FinishedSession, SessionStore, StoreError};
/// use matharena_session::{SessionId, UserId};
///
/// /// Hands every session the id 1 and forgets everything.
/// struct NullStore;
///
/// impl SessionStore for NullStore {
///     async fn create_session(
///         &self,
///         _user_id: UserId,
///         _started_at: DateTime<Utc>,
///     ) -> Result<SessionId, StoreError> {
///         Ok(SessionId(1))
///     }
///
///     async fn finish_session(
///         &self,
///         _record: FinishedSession,
///     ) -> Result<(), StoreError> {
///         Ok(())
///     }
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Records that `user_id` started a session and returns its id.
    ///
    /// # Errors
    /// - [`StoreError::UserNotFound`]: the user doesn't exist
    /// - [`StoreError::Backend`]: anything else
    fn create_session(
        &self,
        user_id: UserId,
        started_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<SessionId, StoreError>> + Send;

    /// Records the end of a session. Called at most once per session.
    ///
    /// # Errors
    /// - [`StoreError::RecordNotFound`]: no start record for this id
    /// - [`StoreError::AlreadyRecorded`]: the finish is already stored
    fn finish_session(
        &self,
        record: FinishedSession,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemorySessionStore
// ---------------------------------------------------------------------------

/// One row of [`InMemorySessionStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub score: u32,
}

/// A [`SessionStore`] that keeps everything in a `HashMap`.
///
/// Ids come from a counter starting at 1. By default every user is
/// accepted; [`with_users`](Self::with_users) restricts it to a known set.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    next_id: AtomicU64,
    users: Option<HashSet<UserId>>,
    records: Mutex<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accepts sessions for these users.
    pub fn with_users(users: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            users: Some(users.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Looks up the record for a session.
    pub async fn record(&self, id: SessionId) -> Option<SessionRecord> {
        self.records.lock().await.get(&id).cloned()
    }

    /// Number of sessions with a recorded finish.
    pub async fn finished_count(&self) -> usize {
        self.records
            .lock()
            .await
            .values()
            .filter(|r| r.finished_at.is_some())
            .count()
    }
}

impl SessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        user_id: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, StoreError> {
        let known = self.users.as_ref().is_none_or(|u| u.contains(&user_id));
        if !known {
            return Err(StoreError::UserNotFound(user_id));
        }

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.records.lock().await.insert(
            id,
            SessionRecord {
                user_id,
                started_at,
                finished_at: None,
                score: 0,
            },
        );
        Ok(id)
    }

    async fn finish_session(
        &self,
        record: FinishedSession,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let row = records
            .get_mut(&record.id)
            .ok_or(StoreError::RecordNotFound(record.id))?;

        if row.finished_at.is_some() {
            return Err(StoreError::AlreadyRecorded(record.id));
        }
        row.finished_at = Some(record.finished_at);
        row.score = record.score;
        Ok(())
    }
}
