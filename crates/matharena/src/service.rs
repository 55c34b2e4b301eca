//! `GameService` builder and the request-level operations.
//!
//! This is the entry point for running Matharena. It ties the layers
//! together: generator → session → registry → store.
//!
//! Every operation takes `now` from the caller. The service never reads
//! the clock, so a test can replay a whole game at fixed instants.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use matharena_expr::{Difficulty, Generator, RandomGenerator};
use matharena_session::{
    Outcome, Session, SessionConfig, SessionError, SessionId, SessionRegistry,
    SessionView, UserId,
};
use serde::{Deserialize, Serialize};

use crate::{FinishedSession, MatharenaError, SessionStore};

/// Makes a fresh generator for each new session.
pub type GeneratorFactory = Arc<dyn Fn() -> Box<dyn Generator> + Send + Sync>;

fn random_generator() -> Box<dyn Generator> {
    Box::new(RandomGenerator::new())
}

/// The result of [`GameService::submit_answer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerView {
    pub outcome: Outcome,
    /// The session right after the answer was scored. When `outcome` is
    /// [`Outcome::Expired`] this is the final snapshot.
    pub session: SessionView,
}

/// What [`GameService::sweep_expired`] did with each expired session.
///
/// Every session listed here has left the registry, whether or not its
/// finish reached the store.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Final snapshots whose finish the store accepted.
    pub recorded: Vec<SessionView>,
    /// Final snapshots the store refused, with the reason.
    pub failed: Vec<(SessionView, MatharenaError)>,
}

impl SweepReport {
    /// Number of sessions drained, recorded or not.
    pub fn len(&self) -> usize {
        self.recorded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared service state, cloned into every handle via `Arc`.
struct ServiceState<S: SessionStore> {
    registry: SessionRegistry,
    store: S,
    session_config: SessionConfig,
    generator_factory: GeneratorFactory,
}

// ---------------------------------------------------------------------------
// GameServiceBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring a [`GameService`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use matharena::prelude::*;
///
/// let service = GameService::builder()
///     .session_config(SessionConfig {
///         start_budget: Duration::from_secs(30),
///         ..SessionConfig::default()
///     })
///     .build(InMemorySessionStore::new());
///
/// assert_eq!(service.session_config().start_budget, Duration::from_secs(30));
/// ```
pub struct GameServiceBuilder {
    session_config: SessionConfig,
    generator_factory: GeneratorFactory,
}

impl GameServiceBuilder {
    /// Creates a new builder with default settings: default session
    /// config, OS-seeded random generators.
    pub fn new() -> Self {
        Self {
            session_config: SessionConfig::default(),
            generator_factory: Arc::new(random_generator),
        }
    }

    /// Sets the session configuration. Out-of-range values are clamped
    /// when the service is built.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets how each session gets its generator. Tests use this to inject
    /// seeded or scripted generators.
    pub fn generator_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Generator> + Send + Sync + 'static,
    {
        self.generator_factory = Arc::new(factory);
        self
    }

    /// Builds the service around the given store.
    pub fn build<S: SessionStore>(self, store: S) -> GameService<S> {
        let state = Arc::new(ServiceState {
            registry: SessionRegistry::new(),
            store,
            session_config: self.session_config.validated(),
            generator_factory: self.generator_factory,
        });
        GameService { state }
    }
}

impl Default for GameServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// GameService
// ---------------------------------------------------------------------------

/// Runs quiz sessions on behalf of request handlers.
///
/// Cheap to clone: every clone shares the same registry and store.
///
/// ## Where finishes get recorded
///
/// A session can end in four places: an answer spends the budget, a
/// lookup finds it past its deadline, the player stops it, or
/// [`sweep_expired`](Self::sweep_expired) drains it. Each of these removes
/// it from the registry under the registry lock, and only the caller that
/// removed it writes the finish to the store. So every finish is recorded
/// exactly once.
pub struct GameService<S: SessionStore> {
    state: Arc<ServiceState<S>>,
}

impl<S: SessionStore> Clone for GameService<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl GameService<crate::InMemorySessionStore> {
    /// Creates a new builder.
    pub fn builder() -> GameServiceBuilder {
        GameServiceBuilder::new()
    }
}

impl<S: SessionStore> GameService<S> {
    /// Starts a session for `user_id` with `start_budget` to spend.
    ///
    /// The store is asked first, since it hands out the id. If the session
    /// then fails to start, the store record is closed straight away so no
    /// record is left dangling.
    ///
    /// # Errors
    /// - [`MatharenaError::Store`]: the store rejected the user or failed
    /// - [`MatharenaError::Session`]: no expression could be generated
    ///   for `difficulty`, or the store handed out an id already in use
    pub async fn create_session(
        &self,
        user_id: UserId,
        start_budget: Duration,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<SessionView, MatharenaError> {
        let state = &self.state;
        let id = state.store.create_session(user_id, now).await?;

        let started = Session::builder(user_id)
            .id(id)
            .config(&state.session_config)
            .budget(start_budget)
            .difficulty(difficulty)
            .start((state.generator_factory)(), now);

        let session = match started {
            Ok(session) => session,
            Err(err) => {
                self.close_abandoned(id, user_id, now, &err).await;
                return Err(err.into());
            }
        };

        let view = session.view();
        if let Err(err) = state.registry.put(session).await {
            self.close_abandoned(id, user_id, now, &err).await;
            return Err(err.into());
        }

        tracing::info!(
            session_id = %id,
            %user_id,
            %difficulty,
            budget_ms = view.time_left_ms,
            "session created"
        );
        Ok(view)
    }

    /// Scores an answer.
    ///
    /// An [`Outcome::Expired`] answer is not an error: the session ended
    /// because of (or just before) this answer, and the final snapshot is
    /// in the returned view.
    ///
    /// # Errors
    /// - [`MatharenaError::InvalidSession`]: unknown id, the session had
    ///   already run out before this call, or `user_id` doesn't own it
    /// - [`MatharenaError::Session`]: the next expression couldn't be
    ///   generated
    /// - [`MatharenaError::Store`]: the finish couldn't be recorded
    pub async fn submit_answer(
        &self,
        id: SessionId,
        user_id: UserId,
        value: i64,
        now: DateTime<Utc>,
    ) -> Result<AnswerView, MatharenaError> {
        let result = self
            .state
            .registry
            .update(id, now, |session| {
                check_owner(session, user_id)?;
                let outcome = session.answer(value, now)?;
                Ok(AnswerView {
                    outcome,
                    session: session.view(),
                })
            })
            .await;

        match result {
            Ok(answer) => {
                tracing::debug!(
                    session_id = %id,
                    outcome = ?answer.outcome,
                    score = answer.session.score,
                    "answer scored"
                );
                if answer.outcome == Outcome::Expired {
                    self.record_finish(&answer.session).await?;
                }
                Ok(answer)
            }
            Err(SessionError::Expired(view)) => {
                self.record_finish(&view).await?;
                Err(MatharenaError::invalid(id, SessionError::Expired(view)))
            }
            Err(err) => Err(map_lookup_error(id, err)),
        }
    }

    /// Ends a session early and records the result. Returns the final
    /// snapshot.
    ///
    /// # Errors
    /// - [`MatharenaError::AlreadyStopped`]: the budget had already run
    ///   out (the finish is recorded at the deadline, not at `now`)
    /// - [`MatharenaError::InvalidSession`]: unknown id, or `user_id`
    ///   doesn't own it
    /// - [`MatharenaError::Store`]: the finish couldn't be recorded
    pub async fn stop_session(
        &self,
        id: SessionId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<SessionView, MatharenaError> {
        let result = self
            .state
            .registry
            .update(id, now, |session| {
                check_owner(session, user_id)?;
                session.stop(now);
                Ok(session.view())
            })
            .await;

        match result {
            Ok(view) => {
                self.record_finish(&view).await?;
                tracing::info!(
                    session_id = %id,
                    %user_id,
                    score = view.score,
                    "session stopped"
                );
                Ok(view)
            }
            Err(SessionError::Expired(view)) => {
                self.record_finish(&view).await?;
                Err(MatharenaError::AlreadyStopped(id))
            }
            Err(err) => Err(map_lookup_error(id, err)),
        }
    }

    /// Returns a snapshot of a live session.
    ///
    /// # Errors
    /// - [`MatharenaError::InvalidSession`]: unknown id, or the session
    ///   ran out (its finish is recorded on the way out)
    /// - [`MatharenaError::Store`]: the finish couldn't be recorded
    pub async fn session(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<SessionView, MatharenaError> {
        match self.state.registry.get(id, now).await {
            Ok(view) => Ok(view),
            Err(SessionError::Expired(view)) => {
                self.record_finish(&view).await?;
                Err(MatharenaError::invalid(id, SessionError::Expired(view)))
            }
            Err(err) => Err(map_lookup_error(id, err)),
        }
    }

    /// Finishes every session that ran out by `now` and records them.
    ///
    /// Nothing calls this on a timer; the owner of the service decides
    /// when (if ever) to sweep. A store failure for one session doesn't
    /// stop the others; it lands in [`SweepReport::failed`] so the caller
    /// can retry or alert.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> SweepReport {
        let expired = self.state.registry.drain_expired(now).await;
        let mut report = SweepReport::default();
        for view in expired {
            match self.record_finish(&view).await {
                Ok(()) => report.recorded.push(view),
                Err(err) => report.failed.push((view, err)),
            }
        }
        if !report.failed.is_empty() {
            tracing::warn!(
                recorded = report.recorded.len(),
                failed = report.failed.len(),
                "sweep left finishes unrecorded"
            );
        }
        report
    }

    /// The (validated) config new sessions start from.
    pub fn session_config(&self) -> &SessionConfig {
        &self.state.session_config
    }

    pub fn store(&self) -> &S {
        &self.state.store
    }

    /// Number of live sessions.
    pub async fn active_sessions(&self) -> usize {
        self.state.registry.len().await
    }

    async fn record_finish(&self, view: &SessionView) -> Result<(), MatharenaError> {
        let Some(record) = FinishedSession::from_view(view) else {
            tracing::warn!(session_id = %view.id, "not finished, nothing to record");
            return Ok(());
        };

        self.state.store.finish_session(record).await.map_err(|err| {
            tracing::error!(session_id = %view.id, error = %err, "failed to record finish");
            MatharenaError::from(err)
        })
    }

    /// Closes the store record of a session that never made it into the
    /// registry.
    async fn close_abandoned(
        &self,
        id: SessionId,
        user_id: UserId,
        now: DateTime<Utc>,
        cause: &SessionError,
    ) {
        tracing::warn!(
            session_id = %id,
            %user_id,
            error = %cause,
            "session failed to start, closing store record"
        );
        let record = FinishedSession {
            id,
            user_id,
            started_at: now,
            finished_at: now,
            score: 0,
        };
        if let Err(err) = self.state.store.finish_session(record).await {
            tracing::error!(session_id = %id, error = %err, "failed to close store record");
        }
    }
}

fn check_owner(session: &Session, user_id: UserId) -> Result<(), SessionError> {
    if session.user_id() == user_id {
        Ok(())
    } else {
        Err(SessionError::OwnerMismatch {
            id: session.id(),
            user_id,
        })
    }
}

/// Registry lookups that mean "no such session for you" become
/// `InvalidSession`; anything else passes through.
fn map_lookup_error(id: SessionId, err: SessionError) -> MatharenaError {
    match err {
        SessionError::NotFound(_) | SessionError::OwnerMismatch { .. } => {
            MatharenaError::invalid(id, err)
        }
        other => other.into(),
    }
}
