//! Session types: one player's timed quiz.
//!
//! A "session" is the server's record of a game in progress. It tracks:
//! - WHO is playing (`UserId`) and WHICH game it is (`SessionId`)
//! - WHAT the player is looking at (the current expression and its answer)
//! - HOW MUCH time is left, and how answers change that
//! - WHEN it started and, once over, when it ended
//!
//! # Time model
//!
//! The budget is stored as "time left as of the moment the current
//! expression was issued". The session never ticks on its own; the
//! deadline is simply `last_issued_at + time_left`, compared against the
//! `now` every caller passes in. `time_left` is a signed [`TimeDelta`]
//! because it can dip below zero for a moment while an answer is being
//! scored, before the session is finished and the value clamped.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use matharena_expr::{Difficulty, Expression, Generator};
use serde::{Deserialize, Serialize};

use crate::{SessionError, SessionId, UserId};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// How much time an answer wins or costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deltas {
    /// Added to the budget on a correct answer.
    pub on_correct: Duration,
    /// Taken from the budget on an incorrect answer.
    pub on_incorrect: Duration,
}

impl Default for Deltas {
    fn default() -> Self {
        Self {
            on_correct: Duration::from_secs(5),
            on_incorrect: Duration::from_secs(5),
        }
    }
}

/// Configuration for new sessions.
///
/// Sensible defaults are provided: one minute to start with, five seconds
/// won or lost per answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// The time budget a session starts with.
    pub start_budget: Duration,

    /// Time won/lost per answer.
    pub deltas: Deltas,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_budget: Duration::from_secs(60),
            deltas: Deltas::default(),
        }
    }
}

impl SessionConfig {
    /// Upper bound for every duration in the config.
    pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

    /// Clamps any out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        self.start_budget = clamp_duration("start_budget", self.start_budget);
        self.deltas.on_correct =
            clamp_duration("deltas.on_correct", self.deltas.on_correct);
        self.deltas.on_incorrect =
            clamp_duration("deltas.on_incorrect", self.deltas.on_incorrect);
        self
    }
}

fn clamp_duration(field: &str, value: Duration) -> Duration {
    if value > SessionConfig::MAX_DURATION {
        tracing::warn!(
            field,
            value_secs = value.as_secs(),
            max_secs = SessionConfig::MAX_DURATION.as_secs(),
            "session duration exceeds maximum, clamping"
        );
        SessionConfig::MAX_DURATION
    } else {
        value
    }
}

/// `std::time::Duration` → signed `TimeDelta`. Values are clamped first,
/// so the conversion can't go out of range.
fn to_delta(value: Duration) -> TimeDelta {
    TimeDelta::from_std(value.min(SessionConfig::MAX_DURATION))
        .unwrap_or_else(|_| TimeDelta::zero())
}

// ---------------------------------------------------------------------------
// SessionState / Outcome
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// ```text
///   Active ──(budget spent / stop)──→ Finished
/// ```
///
/// The transition is one-way: a finished session is never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// The player is still answering.
    Active,

    /// The game is over. `at` is when the budget ran out (or when the
    /// player stopped), not necessarily when we noticed.
    Finished { at: DateTime<Utc> },
}

/// What happened to a submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Right answer: time was added, the score went up, a new expression
    /// was issued.
    Correct,
    /// Wrong answer: time was taken, a new expression was issued anyway.
    Incorrect,
    /// The budget ran out (before or because of this answer). The session
    /// is finished.
    Expired,
}

// ---------------------------------------------------------------------------
// SessionView
// ---------------------------------------------------------------------------

/// A read-only snapshot of a session, safe to hand out of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: SessionId,
    pub user_id: UserId,
    pub difficulty: Difficulty,
    /// The current expression, rendered.
    pub expression: String,
    pub score: u32,
    /// Budget left as of the last issued expression, in milliseconds.
    pub time_left_ms: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionView {
    pub fn time_left(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.time_left_ms)
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// SessionBuilder
// ---------------------------------------------------------------------------

/// Builder for a new [`Session`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use chrono::Utc;
/// use matharena_expr::{Difficulty, RandomGenerator};
/// use matharena_session::{Session, SessionId, UserId};
///
/// let session = Session::builder(UserId(1))
///     .id(SessionId(42))
///     .budget(Duration::from_secs(30))
///     .difficulty(Difficulty::Easy)
///     .start(Box::new(RandomGenerator::new()), Utc::now())
///     .unwrap();
///
/// assert_eq!(session.score(), 0);
/// assert!(!session.expression().render().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    user_id: UserId,
    id: Option<SessionId>,
    budget: Duration,
    deltas: Deltas,
    difficulty: Difficulty,
}

impl SessionBuilder {
    /// Uses a specific id instead of a random one. Stores that hand out
    /// their own ids (e.g. a database sequence) pass them in here.
    pub fn id(mut self, id: SessionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the starting time budget.
    pub fn budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Sets the time won/lost per answer.
    pub fn deltas(mut self, deltas: Deltas) -> Self {
        self.deltas = deltas;
        self
    }

    /// Takes the budget and deltas from a config.
    pub fn config(mut self, config: &SessionConfig) -> Self {
        self.budget = config.start_budget;
        self.deltas = config.deltas;
        self
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Starts the session at `now` and issues its first expression.
    ///
    /// # Errors
    /// - [`SessionError::Generate`]: the generator has nothing for this
    ///   difficulty
    /// - [`SessionError::Eval`]: the generator produced an expression
    ///   that can't be evaluated
    pub fn start(
        self,
        mut generator: Box<dyn Generator>,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let (expression, answer) =
            next_expression(generator.as_mut(), self.difficulty)?;

        Ok(Session {
            id: self.id.unwrap_or_else(SessionId::random),
            user_id: self.user_id,
            difficulty: self.difficulty,
            expression,
            answer,
            score: 0,
            time_left: to_delta(self.budget),
            on_correct: to_delta(self.deltas.on_correct),
            on_incorrect: to_delta(self.deltas.on_incorrect),
            started_at: now,
            last_issued_at: now,
            state: SessionState::Active,
            generator,
        })
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single player's timed quiz.
///
/// A session isn't synchronized internally. Share it through a
/// [`SessionRegistry`](crate::SessionRegistry), which only lets one caller
/// touch it at a time.
pub struct Session {
    id: SessionId,
    user_id: UserId,
    difficulty: Difficulty,

    expression: Expression,
    /// Always `expression.evaluate()`, cached when the expression was issued.
    answer: i64,
    score: u32,

    time_left: TimeDelta,
    on_correct: TimeDelta,
    on_incorrect: TimeDelta,

    started_at: DateTime<Utc>,
    last_issued_at: DateTime<Utc>,
    state: SessionState,

    generator: Box<dyn Generator>,
}

impl Session {
    /// Starts building a session for `user_id` with default settings.
    pub fn builder(user_id: UserId) -> SessionBuilder {
        let defaults = SessionConfig::default();
        SessionBuilder {
            user_id,
            id: None,
            budget: defaults.start_budget,
            deltas: defaults.deltas,
            difficulty: Difficulty::default(),
        }
    }

    /// Scores an answer submitted at `now`.
    ///
    /// The time since the current expression was issued is always charged,
    /// right or wrong. Then:
    ///
    /// 1. budget spent → the session finishes at the instant it crossed
    ///    zero, [`Outcome::Expired`]
    /// 2. wrong answer → the penalty is charged; if that spends the budget
    ///    the session finishes ([`Outcome::Expired`]), otherwise a new
    ///    expression is issued ([`Outcome::Incorrect`])
    /// 3. right answer → the reward is added, the score goes up, a new
    ///    expression is issued ([`Outcome::Correct`])
    ///
    /// # Errors
    /// - [`SessionError::AlreadyFinished`]: the session already ended
    /// - [`SessionError::Generate`] / [`SessionError::Eval`]: the next
    ///   expression couldn't be issued
    pub fn answer(
        &mut self,
        submitted: i64,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        if self.is_finished() {
            return Err(SessionError::AlreadyFinished(self.id));
        }

        // A clock that steps backwards must not hand out free time.
        let elapsed = (now - self.last_issued_at).max(TimeDelta::zero());
        let mut time_left = self.time_left - elapsed;

        if time_left <= TimeDelta::zero() {
            self.time_left = TimeDelta::zero();
            self.last_issued_at = now;
            self.finish(now + time_left);
            return Ok(Outcome::Expired);
        }

        let correct = submitted == self.answer;
        if correct {
            time_left = time_left + self.on_correct;
        } else {
            time_left = time_left - self.on_incorrect;
            if time_left <= TimeDelta::zero() {
                self.time_left = TimeDelta::zero();
                self.last_issued_at = now;
                self.finish(now + time_left);
                return Ok(Outcome::Expired);
            }
        }

        // Nothing is committed until the next expression exists, so a
        // failed generation leaves the session exactly as it was.
        let (expression, answer) =
            next_expression(self.generator.as_mut(), self.difficulty)?;
        self.expression = expression;
        self.answer = answer;
        self.time_left = time_left;
        self.last_issued_at = now;

        if correct {
            self.score += 1;
            tracing::debug!(
                session_id = %self.id,
                score = self.score,
                time_left_ms = self.time_left.num_milliseconds(),
                "answer correct"
            );
            Ok(Outcome::Correct)
        } else {
            tracing::debug!(
                session_id = %self.id,
                submitted,
                time_left_ms = self.time_left.num_milliseconds(),
                "answer incorrect"
            );
            Ok(Outcome::Incorrect)
        }
    }

    /// Ends the session at `now`.
    ///
    /// `time_left` becomes what was actually left at `now`. Calling it on
    /// a finished session changes nothing; the first finish time is kept.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        if !self.is_finished() {
            let left = self.remaining_at(now).min(self.time_left);
            self.time_left = left;
            self.finish(now);
        }
    }

    /// Whether the budget has run out as of `now`. Pure; see
    /// [`expire_if_due`](Self::expire_if_due) for the mutating version.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            SessionState::Finished { .. } => true,
            SessionState::Active => now >= self.deadline(),
        }
    }

    /// Finishes the session at its deadline if the budget has run out as
    /// of `now`. Returns `true` if the session is (now) finished.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_finished() {
            return true;
        }
        if now >= self.deadline() {
            let deadline = self.deadline();
            self.time_left = TimeDelta::zero();
            self.finish(deadline);
            return true;
        }
        false
    }

    /// The instant the budget runs out if no answer comes in.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.last_issued_at + self.time_left
    }

    /// Budget left as of `now` (zero once finished or past the deadline).
    pub fn remaining_at(&self, now: DateTime<Utc>) -> TimeDelta {
        match self.state {
            SessionState::Finished { .. } => TimeDelta::zero(),
            SessionState::Active => {
                (self.deadline() - now).max(TimeDelta::zero())
            }
        }
    }

    /// Takes a snapshot for callers outside the registry lock.
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            user_id: self.user_id,
            difficulty: self.difficulty,
            expression: self.expression.render(),
            score: self.score,
            time_left_ms: self.time_left.num_milliseconds(),
            started_at: self.started_at,
            finished_at: self.finished_at(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// The value of [`expression`](Self::expression). Don't send this to
    /// the player.
    pub fn answer_value(&self) -> i64 {
        self.answer
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Budget left as of [`last_issued_at`](Self::last_issued_at).
    pub fn time_left(&self) -> TimeDelta {
        self.time_left
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_issued_at(&self) -> DateTime<Utc> {
        self.last_issued_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SessionState::Active => None,
            SessionState::Finished { at } => Some(at),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Finished { .. })
    }

    /// Marks the session finished. Callers set `time_left` first.
    fn finish(&mut self, at: DateTime<Utc>) {
        self.state = SessionState::Finished { at };
        self.time_left = self.time_left.max(TimeDelta::zero());
        tracing::info!(
            session_id = %self.id,
            user_id = %self.user_id,
            score = self.score,
            finished_at = %at,
            "session finished"
        );
    }
}

/// Generates an expression and evaluates it, so the pair always agrees.
fn next_expression(
    generator: &mut dyn Generator,
    difficulty: Difficulty,
) -> Result<(Expression, i64), SessionError> {
    let expression = generator.generate(difficulty)?;
    let answer = expression.evaluate()?;
    Ok((expression, answer))
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("difficulty", &self.difficulty)
            .field("expression", &self.expression)
            .field("score", &self.score)
            .field("time_left", &self.time_left)
            .field("last_issued_at", &self.last_issued_at)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================
