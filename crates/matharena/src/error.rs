//! Unified error type for Matharena.

use matharena_session::{SessionError, SessionId};

use crate::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// The service maps the registry's "not there any more" conditions onto
/// the two client-facing errors ([`InvalidSession`](Self::InvalidSession),
/// [`AlreadyStopped`](Self::AlreadyStopped)); everything else passes
/// through transparently via `#[from]`.
#[derive(Debug, thiserror::Error)]
pub enum MatharenaError {
    /// A session-level error (generation failed, already finished, ...).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The persistent store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session is unknown, already over, or belongs to someone else.
    /// `source` says which.
    #[error("invalid session {id}")]
    InvalidSession {
        id: SessionId,
        #[source]
        source: SessionError,
    },

    /// The session's budget had already run out when the stop came in.
    #[error("session {0} already stopped")]
    AlreadyStopped(SessionId),
}

impl MatharenaError {
    /// Wraps a registry error as [`InvalidSession`](Self::InvalidSession).
    pub(crate) fn invalid(id: SessionId, source: SessionError) -> Self {
        Self::InvalidSession { id, source }
    }
}
