//! Pool-price quoting and value normalisation.
//!
//! Vault values are expressed in token1 units: `amount1 + amount0 * price`
//! where `price = (sqrt_price / 2^96)^2`.

use crate::error::MathError;
use crate::math::full_math::mul_div;
use crate::token::TokenAmounts;
use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const DISPLAY_SCALE: u32 = 18;

/// Converts `amount0` of token0 into token1 at `sqrt_price_x96`, rounding down.
pub fn quote_token0_in_token1(sqrt_price_x96: U256, amount0: U256) -> Result<U256, MathError> {
    if sqrt_price_x96 <= U256::from(u128::MAX) {
        let ratio_x192 = sqrt_price_x96 * sqrt_price_x96;
        mul_div(ratio_x192, amount0, U256::one() << 192)
    } else {
        let ratio_x128 = mul_div(sqrt_price_x96, sqrt_price_x96, U256::one() << 64)?;
        mul_div(ratio_x128, amount0, U256::one() << 128)
    }
}

/// Converts `amount1` of token1 into token0 at `sqrt_price_x96`, rounding down.
pub fn quote_token1_in_token0(sqrt_price_x96: U256, amount1: U256) -> Result<U256, MathError> {
    if sqrt_price_x96 <= U256::from(u128::MAX) {
        let ratio_x192 = sqrt_price_x96 * sqrt_price_x96;
        mul_div(U256::one() << 192, amount1, ratio_x192)
    } else {
        let ratio_x128 = mul_div(sqrt_price_x96, sqrt_price_x96, U256::one() << 64)?;
        mul_div(U256::one() << 128, amount1, ratio_x128)
    }
}

/// Value of `amounts` in token1 units.
pub fn value_in_token1(sqrt_price_x96: U256, amounts: TokenAmounts) -> Result<U256, MathError> {
    quote_token0_in_token1(sqrt_price_x96, amounts.amount0)?
        .checked_add(amounts.amount1)
        .ok_or(MathError::Overflow)
}

/// Human-readable price of token0 in token1 (raw units, no decimals
/// adjustment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price {
    pub value: Decimal,
}

impl Price {
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Price implied by a Q64.96 sqrt price, with up to 18 decimal places.
    pub fn from_sqrt_price_x96(sqrt_price_x96: U256) -> Result<Self, MathError> {
        let unit = U256::exp10(DISPLAY_SCALE as usize);
        let mut quoted = quote_token0_in_token1(sqrt_price_x96, unit)?;
        let mut scale = DISPLAY_SCALE;
        // Decimal carries a 96-bit mantissa
        while quoted.bits() > 96 {
            if scale == 0 {
                return Err(MathError::Overflow);
            }
            quoted /= U256::from(10u64);
            scale -= 1;
        }
        let value = Decimal::try_from_i128_with_scale(quoted.low_u128() as i128, scale)
            .map_err(|_| MathError::Overflow)?;
        Ok(Self {
            value: value.normalize(),
        })
    }

    /// Rescales a raw-unit price by the tokens' decimals.
    pub fn adjusted(&self, decimals0: u8, decimals1: u8) -> Result<Self, MathError> {
        let mut value = self.value;
        if decimals0 >= decimals1 {
            for _ in decimals1..decimals0 {
                value = value.checked_mul(Decimal::TEN).ok_or(MathError::Overflow)?;
            }
        } else {
            for _ in decimals0..decimals1 {
                value = value
                    .checked_div(Decimal::TEN)
                    .ok_or(MathError::Underflow)?;
            }
        }
        Ok(Self { value })
    }
}
