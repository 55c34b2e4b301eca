//! Timed quiz sessions for Matharena.
//!
//! This crate handles the lifecycle of a single game:
//!
//! 1. **Identity**: who plays ([`UserId`]) and which game it is ([`SessionId`])
//! 2. **The state machine**: a [`Session`] spends its time budget, gains
//!    or loses time on each answer, and ends when the budget hits zero
//! 3. **The registry**: a [`SessionRegistry`] holds every live session
//!    and is safe to share across request handlers
//!
//! # How it fits in the stack
//!
//! ```text
//! Service Layer (above)  ← binds the registry to a persistent store
//!     ↕
//! Session Layer (this crate)  ← time budgets, scores, expiry
//!     ↕
//! Expression Layer (below)  ← provides Expression, Generator
//! ```
//!
//! Nothing in here reads the clock. Every operation that depends on time
//! takes `now` as an argument, so tests can drive time by hand.

mod error;
mod id;
mod registry;
mod session;

pub use error::{ParseSessionIdError, SessionError};
pub use id::{SessionId, UserId};
pub use registry::SessionRegistry;
pub use session::{
    Deltas, Outcome, Session, SessionBuilder, SessionConfig, SessionState,
    SessionView,
};
