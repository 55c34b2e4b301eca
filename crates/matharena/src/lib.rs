//! # Matharena
//!
//! A timed arithmetic quiz engine.
//!
//! A player opens a session with a time budget and is served arithmetic
//! expressions. Every correct answer wins time, every wrong answer costs
//! time, and the game is over when the budget hits zero.
//!
//! This crate wires the layers together:
//!
//! - [`matharena_expr`]: expressions, their rendering, and generators
//! - [`matharena_session`]: the session state machine and the live
//!   session registry
//! - here: [`GameService`], which runs sessions against a persistent
//!   [`SessionStore`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use chrono::Utc;
//! use matharena::prelude::*;
//!
//! # async fn run() -> Result<(), MatharenaError> {
//! let service = GameService::builder().build(InMemorySessionStore::new());
//!
//! let view = service
//!     .create_session(UserId(1), Duration::from_secs(60), Difficulty::Easy, Utc::now())
//!     .await?;
//! println!("{} = ?", view.expression);
//!
//! let answer = service
//!     .submit_answer(view.id, UserId(1), 42, Utc::now())
//!     .await?;
//! println!("{:?}, score {}", answer.outcome, answer.session.score);
//! # Ok(())
//! # }
//! ```

mod error;
mod service;
mod store;

pub use error::MatharenaError;
pub use service::{
    AnswerView, GameService, GameServiceBuilder, GeneratorFactory, SweepReport,
};
pub use store::{
    FinishedSession, InMemorySessionStore, SessionRecord, SessionStore,
    StoreError,
};

/// Everything needed to run a game, in one import.
pub mod prelude {
    pub use matharena_expr::{
        Difficulty, EvalError, Expression, GenerateError, Generator,
        ParseDifficultyError, RandomGenerator, SequenceGenerator,
    };
    pub use matharena_session::{
        Deltas, Outcome, SessionConfig, SessionError, SessionId, SessionView,
        UserId,
    };

    pub use crate::{
        AnswerView, FinishedSession, GameService, GameServiceBuilder,
        InMemorySessionStore, MatharenaError, SessionStore, StoreError,
        SweepReport,
    };
}
