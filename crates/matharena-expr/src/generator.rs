//! Where new expressions come from.
//!
//! A session doesn't build expressions itself; it asks a [`Generator`].
//! Keeping that behind a trait means the randomness is a capability the
//! caller hands in, not global state:
//!
//! - [`RandomGenerator`] draws from any `rand::Rng`. Production code seeds
//!   it from the OS; tests seed it with a fixed number.
//! - [`SequenceGenerator`] replays a scripted list, for tests that need to
//!   know exactly which answer is correct next.

use std::collections::VecDeque;
use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Difficulty, Expression, GenerateError};

/// Number of terms in an easy sum (2 or 3).
const EASY_TERMS: Range<usize> = 2..4;

/// Range each easy term is drawn from.
const EASY_OPERANDS: Range<i64> = 0..50;

/// Produces a fresh expression for a difficulty tier.
///
/// `Send` is required because sessions (which own their generator) live
/// inside a registry shared across Tokio worker threads.
///
/// # Example
///
/// ```rust
/// use matharena_expr::{Difficulty, Expression, GenerateError, Generator};
///
/// /// Always asks the same question. Handy for demos, useless for games.
/// struct Constant42;
///
/// impl Generator for Constant42 {
///     fn generate(
///         &mut self,
///         _difficulty: Difficulty,
///     ) -> Result<Expression, GenerateError> {
///         Ok(Expression::sum([Expression::constant(40), Expression::constant(2)]))
///     }
/// }
///
/// let expr = Constant42.generate(Difficulty::Easy).unwrap();
/// assert_eq!(expr.evaluate(), Ok(42));
/// ```
pub trait Generator: Send {
    /// Returns the next expression for `difficulty`.
    ///
    /// # Errors
    /// - [`GenerateError::Unsupported`]: no recipe for this tier
    /// - [`GenerateError::Exhausted`]: a finite generator ran dry
    fn generate(
        &mut self,
        difficulty: Difficulty,
    ) -> Result<Expression, GenerateError>;
}

// ---------------------------------------------------------------------------
// RandomGenerator
// ---------------------------------------------------------------------------

/// Generates expressions from a random number source.
///
/// Easy: a sum of 2 or 3 constants, each in `0..50`. Medium and Hard have
/// no recipe yet and return [`GenerateError::Unsupported`].
#[derive(Debug, Clone)]
pub struct RandomGenerator<R = StdRng> {
    rng: R,
}

impl RandomGenerator<StdRng> {
    /// A generator seeded from the operating system's entropy source.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// A reproducible generator: the same seed yields the same expressions.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for RandomGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> RandomGenerator<R> {
    /// Wraps an arbitrary random source.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    fn easy(&mut self) -> Expression {
        let terms = self.rng.random_range(EASY_TERMS);
        Expression::sum(
            (0..terms)
                .map(|_| Expression::constant(self.rng.random_range(EASY_OPERANDS))),
        )
    }
}

impl<R: Rng + Send> Generator for RandomGenerator<R> {
    fn generate(
        &mut self,
        difficulty: Difficulty,
    ) -> Result<Expression, GenerateError> {
        let expr = match difficulty {
            Difficulty::Easy => self.easy(),
            Difficulty::Medium | Difficulty::Hard => {
                return Err(GenerateError::Unsupported(difficulty));
            }
        };
        tracing::trace!(%difficulty, expression = %expr, "expression generated");
        Ok(expr)
    }
}

// ---------------------------------------------------------------------------
// SequenceGenerator
// ---------------------------------------------------------------------------

/// Replays a fixed list of expressions in order, whatever the difficulty.
///
/// Returns [`GenerateError::Exhausted`] once the list is used up.
#[derive(Debug, Clone, Default)]
pub struct SequenceGenerator {
    queue: VecDeque<Expression>,
}

impl SequenceGenerator {
    pub fn new(expressions: impl IntoIterator<Item = Expression>) -> Self {
        Self {
            queue: expressions.into_iter().collect(),
        }
    }

    /// How many scripted expressions are left.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl Generator for SequenceGenerator {
    fn generate(
        &mut self,
        _difficulty: Difficulty,
    ) -> Result<Expression, GenerateError> {
        self.queue.pop_front().ok_or(GenerateError::Exhausted)
    }
}
