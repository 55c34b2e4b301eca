//! Error types for the expression layer.
//!
//! Neither of these should ever reach a player. An `EvalError` means some
//! code built an expression it shouldn't have; a `GenerateError` means a
//! caller asked for a tier nobody implemented yet.

use crate::Difficulty;

/// Errors that can occur while evaluating an [`Expression`](crate::Expression).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// Factorial is only defined for non-negative operands.
    #[error("factorial of negative operand {0}")]
    NegativeFactorial(i64),

    /// The operand is above [`MAX_FACTORIAL_OPERAND`](crate::MAX_FACTORIAL_OPERAND);
    /// its factorial does not fit in an `i64`.
    #[error("factorial of {0} overflows a 64-bit integer")]
    FactorialOverflow(i64),

    /// Adding the terms of a sum overflowed an `i64`.
    #[error("sum overflows a 64-bit integer")]
    SumOverflow,
}

/// Errors that can occur while generating a new expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    /// The generator has no recipe for this difficulty tier.
    #[error("difficulty {0} is not supported by this generator")]
    Unsupported(Difficulty),

    /// A [`SequenceGenerator`](crate::SequenceGenerator) ran out of
    /// scripted expressions.
    #[error("generator has no expressions left")]
    Exhausted,
}

/// A string that doesn't name a [`Difficulty`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown difficulty {0:?}")]
pub struct ParseDifficultyError(pub String);
