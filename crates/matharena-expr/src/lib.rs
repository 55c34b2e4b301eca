//! Arithmetic expressions for Matharena.
//!
//! This crate defines what a player is asked to solve:
//!
//! - **Expressions** ([`Expression`]): a tiny numeric AST that can be
//!   evaluated to an integer and rendered as a canonical string.
//! - **Generators** ([`Generator`] trait, [`RandomGenerator`],
//!   [`SequenceGenerator`]): where new expressions come from.
//! - **Errors** ([`EvalError`], [`GenerateError`]): what can go wrong
//!   while evaluating or generating.
//!
//! # Architecture
//!
//! The expression layer is the bottom of the stack. It knows nothing about
//! players, clocks, or sessions: only numbers.
//!
//! ```text
//! Expression (numbers) → Session (time budget, score) → Service (players, store)
//! ```

mod difficulty;
mod error;
mod expression;
mod generator;

pub use difficulty::Difficulty;
pub use error::{EvalError, GenerateError, ParseDifficultyError};
pub use expression::{Expression, MAX_FACTORIAL_OPERAND};
pub use generator::{Generator, RandomGenerator, SequenceGenerator};
