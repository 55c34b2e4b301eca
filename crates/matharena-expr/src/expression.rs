//! The expression tree players are asked to evaluate.
//!
//! An [`Expression`] is a closed set of node kinds: constants, factorials,
//! and sums. Every node can do two things:
//!
//! - **evaluate** to an `i64` ([`Expression::evaluate`])
//! - **render** to a canonical string ([`Display`](fmt::Display), or the
//!   [`Expression::render`] shorthand)
//!
//! Rendering is deterministic and uses as few parentheses as possible while
//! staying unambiguous: parsing the rendered string back yields the same
//! value as evaluating the tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EvalError;

/// Largest operand whose factorial fits in an `i64` (20! ≈ 2.4 × 10¹⁸).
pub const MAX_FACTORIAL_OPERAND: i64 = 20;

/// 0! through 20!, computed at compile time.
const FACTORIALS: [i64; MAX_FACTORIAL_OPERAND as usize + 1] = factorial_table();

const fn factorial_table() -> [i64; MAX_FACTORIAL_OPERAND as usize + 1] {
    let mut table = [1i64; MAX_FACTORIAL_OPERAND as usize + 1];
    let mut i = 1;
    while i < table.len() {
        table[i] = table[i - 1] * i as i64;
        i += 1;
    }
    table
}

/// A numeric expression.
///
/// This is a Rust `enum` carrying data in each variant, so a whole tree is
/// just nested values: `Sum(vec![Constant(1), Factorial(Box::new(Constant(3)))])`
/// is `1+(3!)`. `Box` is needed for `Factorial` because an enum can't
/// contain itself directly (its size would be infinite).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// An integer literal.
    Constant(i64),

    /// `n!` of the inner expression's value.
    Factorial(Box<Expression>),

    /// The sum of zero or more terms. An empty sum is `0`.
    Sum(Vec<Expression>),
}

impl Expression {
    /// Shorthand for [`Expression::Constant`].
    pub fn constant(value: i64) -> Self {
        Expression::Constant(value)
    }

    /// Wraps `operand` in a factorial.
    pub fn factorial(operand: Expression) -> Self {
        Expression::Factorial(Box::new(operand))
    }

    /// Builds a sum from any iterator of terms.
    pub fn sum(terms: impl IntoIterator<Item = Expression>) -> Self {
        Expression::Sum(terms.into_iter().collect())
    }

    /// Computes the integer value of this expression.
    ///
    /// # Errors
    /// - [`EvalError::NegativeFactorial`]: a factorial operand is below zero
    /// - [`EvalError::FactorialOverflow`]: a factorial operand is above
    ///   [`MAX_FACTORIAL_OPERAND`]
    /// - [`EvalError::SumOverflow`]: the terms of a sum overflow an `i64`
    pub fn evaluate(&self) -> Result<i64, EvalError> {
        match self {
            Expression::Constant(value) => Ok(*value),
            Expression::Factorial(operand) => {
                let n = operand.evaluate()?;
                if n < 0 {
                    return Err(EvalError::NegativeFactorial(n));
                }
                if n > MAX_FACTORIAL_OPERAND {
                    return Err(EvalError::FactorialOverflow(n));
                }
                Ok(FACTORIALS[n as usize])
            }
            Expression::Sum(terms) => terms.iter().try_fold(0i64, |acc, term| {
                acc.checked_add(term.evaluate()?)
                    .ok_or(EvalError::SumOverflow)
            }),
        }
    }

    /// Renders the canonical string form, e.g. `"23+10+90-9+1"`.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// `true` for sums that render as nothing (empty, or made only of
    /// such sums). They are worth `0`, so skipping them keeps the value.
    fn renders_empty(&self) -> bool {
        match self {
            Expression::Sum(terms) => terms.iter().all(Expression::renders_empty),
            _ => false,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(value) => write!(f, "{value}"),
            Expression::Factorial(operand) => {
                if operand.renders_empty() {
                    f.write_str("0!")
                } else if matches!(operand.as_ref(), Expression::Sum(_)) {
                    write!(f, "({operand})!")
                } else {
                    write!(f, "{operand}!")
                }
            }
            Expression::Sum(terms) => {
                let mut first = true;
                for term in terms.iter().filter(|t| !t.renders_empty()) {
                    match term {
                        // The minus sign doubles as the separator.
                        Expression::Constant(value) if *value < 0 => {
                            write!(f, "{value}")?;
                        }
                        Expression::Constant(_) => {
                            if !first {
                                f.write_str("+")?;
                            }
                            write!(f, "{term}")?;
                        }
                        Expression::Sum(_) => {
                            let inner = term.to_string();
                            if !first && !inner.starts_with('-') {
                                f.write_str("+")?;
                            }
                            f.write_str(&inner)?;
                        }
                        Expression::Factorial(_) => {
                            if !first {
                                f.write_str("+")?;
                            }
                            write!(f, "({term})")?;
                        }
                    }
                    first = false;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Expression::Constant(value)
    }
}
