//! Token deltas between two sqrt prices for a given liquidity.

use crate::error::MathError;
use crate::math::full_math::{div_rounding_up, mul_div, mul_div_rounding_up};
use crate::math::{Q96, RESOLUTION};
use primitive_types::U256;

fn sorted(a: U256, b: U256) -> (U256, U256) {
    if a > b { (b, a) } else { (a, b) }
}

/// Amount of token0 between two sqrt prices:
/// `liquidity * (sqrt_b - sqrt_a) / (sqrt_a * sqrt_b)`.
///
/// # Errors
///
/// Returns [`MathError::DivisionByZero`] when the lower sqrt price is zero.
pub fn get_amount0_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    if sqrt_a.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION;
    let numerator2 = sqrt_b - sqrt_a;

    if round_up {
        div_rounding_up(mul_div_rounding_up(numerator1, numerator2, sqrt_b)?, sqrt_a)
    } else {
        Ok(mul_div(numerator1, numerator2, sqrt_b)? / sqrt_a)
    }
}

/// Amount of token1 between two sqrt prices: `liquidity * (sqrt_b - sqrt_a)`.
pub fn get_amount1_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    let liquidity = U256::from(liquidity);
    if round_up {
        mul_div_rounding_up(liquidity, sqrt_b - sqrt_a, Q96)
    } else {
        mul_div(liquidity, sqrt_b - sqrt_a, Q96)
    }
}

/// Token amounts represented by `liquidity` over `[sqrt_lower, sqrt_upper]`
/// when the pool trades at `sqrt_price`.
///
/// Below the range the position is all token0, above it all token1.
pub fn get_amounts_delta(
    sqrt_price_x96: U256,
    sqrt_lower_x96: U256,
    sqrt_upper_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<(U256, U256), MathError> {
    let (sqrt_lower, sqrt_upper) = sorted(sqrt_lower_x96, sqrt_upper_x96);
    if liquidity == 0 {
        return Ok((U256::zero(), U256::zero()));
    }

    if sqrt_price_x96 <= sqrt_lower {
        let amount0 = get_amount0_delta(sqrt_lower, sqrt_upper, liquidity, round_up)?;
        Ok((amount0, U256::zero()))
    } else if sqrt_price_x96 < sqrt_upper {
        let amount0 = get_amount0_delta(sqrt_price_x96, sqrt_upper, liquidity, round_up)?;
        let amount1 = get_amount1_delta(sqrt_lower, sqrt_price_x96, liquidity, round_up)?;
        Ok((amount0, amount1))
    } else {
        let amount1 = get_amount1_delta(sqrt_lower, sqrt_upper, liquidity, round_up)?;
        Ok((U256::zero(), amount1))
    }
}
