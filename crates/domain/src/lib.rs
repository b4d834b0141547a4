//! Fixed-point math and core value types for concentrated-liquidity vaults.

/// Error types.
pub mod error;
/// Q64.96 math: tick conversion, amount deltas, liquidity fitting.
pub mod math;
/// Quoting between the two tokens of a pool.
pub mod price;
/// Validated tick ranges.
pub mod range;
/// Token identities and amount pairs.
pub mod token;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{MathError, RangeError};
    pub use crate::math::Q96;
    pub use crate::math::full_math::{mul_div, mul_div_rounding_up, to_u128};
    pub use crate::math::liquidity_amounts::{
        get_amounts_for_liquidity, get_liquidity_for_amounts,
    };
    pub use crate::math::sqrt_price_math::get_amounts_delta;
    pub use crate::math::tick_math::{MAX_TICK, MIN_TICK, get_sqrt_ratio_at_tick};
    pub use crate::price::{Price, quote_token0_in_token1, quote_token1_in_token0, value_in_token1};
    pub use crate::range::TickRange;
    pub use crate::token::{Address, Token, TokenAmounts};
}
