//! Error types for the session layer.

use matharena_expr::{EvalError, GenerateError};

use crate::{SessionId, SessionView, UserId};

/// Errors that can occur during session management.
///
/// These cover the full lifecycle of a quiz session: creation, lookup,
/// answering, and expiration.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given id. Either it never existed, or it
    /// already ended and was removed from the registry.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session existed but its time budget had run out by the time it
    /// was looked up. The registry has already evicted it; the final
    /// snapshot is attached so the caller can record the result.
    #[error("session {} expired", .0.id)]
    Expired(Box<SessionView>),

    /// A session with this id is already registered.
    #[error("session {0} already exists")]
    AlreadyExists(SessionId),

    /// The session has already ended and can't be changed any more.
    #[error("session {0} is already finished")]
    AlreadyFinished(SessionId),

    /// The session belongs to a different player.
    #[error("session {id} does not belong to user {user_id}")]
    OwnerMismatch { id: SessionId, user_id: UserId },

    /// The generator couldn't produce the next expression.
    #[error(transparent)]
    Generate(#[from] GenerateError),

    /// A generated expression couldn't be evaluated. Generators should
    /// never produce these, so this points at a bug in the generator.
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// A string that isn't a valid [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid session id: {0:?}")]
pub struct ParseSessionIdError(pub String);
