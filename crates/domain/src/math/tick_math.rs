//! Conversion from ticks to Q64.96 sqrt prices.
//!
//! `sqrt_price(tick) = sqrt(1.0001^tick) * 2^96`, computed with the same
//! bit-decomposition table the on-chain pools use so that results match them
//! exactly.

use crate::error::MathError;
use primitive_types::U256;

/// Lowest tick whose sqrt price fits the Q64.96 domain.
pub const MIN_TICK: i32 = -887_272;
/// Highest tick whose sqrt price fits the Q64.96 domain.
pub const MAX_TICK: i32 = -MIN_TICK;

/// `2^128 / sqrt(1.0001)^(2^i)` for every bit `i >= 1` of the absolute tick.
const TICK_MULTIPLIERS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

/// Multiplier for bit 0 of the absolute tick.
const TICK_BIT0_MULTIPLIER: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;

/// Returns the Q64.96 sqrt price at `tick`.
///
/// # Errors
///
/// Returns [`MathError::TickOutOfBounds`] when `tick` is outside
/// `[MIN_TICK, MAX_TICK]`.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, MathError> {
    let abs_tick = tick.unsigned_abs();
    if abs_tick > MAX_TICK.unsigned_abs() {
        return Err(MathError::TickOutOfBounds(tick));
    }

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(TICK_BIT0_MULTIPLIER)
    } else {
        U256::one() << 128
    };

    for (bit, multiplier) in TICK_MULTIPLIERS {
        if abs_tick & bit != 0 {
            // ratio <= 2^128 and multiplier < 2^128, so the product fits
            ratio = (ratio * U256::from(multiplier)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up so the result never under-reports
    let round_up = !(ratio & U256::from(u32::MAX)).is_zero();
    let sqrt_price = ratio >> 32;
    Ok(if round_up {
        sqrt_price + U256::one()
    } else {
        sqrt_price
    })
}

/// Returns `true` when `tick` lies inside the tick domain.
#[must_use]
pub fn is_valid_tick(tick: i32) -> bool {
    (MIN_TICK..=MAX_TICK).contains(&tick)
}
