//! Error types for fixed-point math and tick ranges.

use thiserror::Error;

/// Failures of the fixed-point math primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    /// Result does not fit the target integer width.
    #[error("arithmetic overflow")]
    Overflow,
    /// Subtraction went below zero.
    #[error("arithmetic underflow")]
    Underflow,
    /// Denominator was zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Tick lies outside `[MIN_TICK, MAX_TICK]`.
    #[error("tick {0} is outside the valid tick domain")]
    TickOutOfBounds(i32),
}

/// Reasons a pair of ticks cannot form a managed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Lower bound is not strictly below the upper bound.
    #[error("lower tick {lower} must be below upper tick {upper}")]
    Inverted {
        /// Lower tick.
        lower: i32,
        /// Upper tick.
        upper: i32,
    },
    /// A bound is outside the tick domain.
    #[error("tick {0} is outside the valid tick domain")]
    OutOfDomain(i32),
    /// A bound is not a multiple of the pool's tick spacing.
    #[error("tick {tick} is not a multiple of tick spacing {spacing}")]
    NotAligned {
        /// Offending tick.
        tick: i32,
        /// Pool tick spacing.
        spacing: i32,
    },
    /// Tick spacing must be positive.
    #[error("tick spacing must be positive, got {0}")]
    InvalidSpacing(i32),
}
