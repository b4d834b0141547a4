//! Liquidity a range can be funded with, and the amounts a liquidity value
//! is worth.
//!
//! Everything here rounds down, so minting the returned liquidity never
//! costs more than the amounts it was computed from.

use crate::error::MathError;
use crate::math::Q96;
use crate::math::full_math::{mul_div, to_u128};
use crate::math::sqrt_price_math::get_amounts_delta;
use primitive_types::U256;

fn sorted(a: U256, b: U256) -> (U256, U256) {
    if a > b { (b, a) } else { (a, b) }
}

/// Liquidity obtainable from `amount0` over `[sqrt_a, sqrt_b]`.
pub fn get_liquidity_for_amount0(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    amount0: U256,
) -> Result<u128, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    let intermediate = mul_div(sqrt_a, sqrt_b, Q96)?;
    to_u128(mul_div(amount0, intermediate, sqrt_b - sqrt_a)?)
}

/// Liquidity obtainable from `amount1` over `[sqrt_a, sqrt_b]`.
pub fn get_liquidity_for_amount1(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    amount1: U256,
) -> Result<u128, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    to_u128(mul_div(amount1, Q96, sqrt_b - sqrt_a)?)
}

/// Maximum liquidity `amount0` and `amount1` can fund over the range at the
/// current sqrt price.
///
/// Below the range only token0 counts, above it only token1; inside, the
/// scarcer side limits the result.
pub fn get_liquidity_for_amounts(
    sqrt_price_x96: U256,
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    amount0: U256,
    amount1: U256,
) -> Result<u128, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);

    if sqrt_price_x96 <= sqrt_a {
        get_liquidity_for_amount0(sqrt_a, sqrt_b, amount0)
    } else if sqrt_price_x96 < sqrt_b {
        let liquidity0 = get_liquidity_for_amount0(sqrt_price_x96, sqrt_b, amount0)?;
        let liquidity1 = get_liquidity_for_amount1(sqrt_a, sqrt_price_x96, amount1)?;
        Ok(liquidity0.min(liquidity1))
    } else {
        get_liquidity_for_amount1(sqrt_a, sqrt_b, amount1)
    }
}

/// Token amounts `liquidity` is worth over the range at the current price,
/// rounded down.
pub fn get_amounts_for_liquidity(
    sqrt_price_x96: U256,
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
) -> Result<(U256, U256), MathError> {
    get_amounts_delta(
        sqrt_price_x96,
        sqrt_ratio_a_x96,
        sqrt_ratio_b_x96,
        liquidity,
        false,
    )
}
