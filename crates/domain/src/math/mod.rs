//! Fixed-point math for concentrated-liquidity positions.
//!
//! Sqrt prices are Q64.96 values held in `U256`; liquidity is `u128`.

/// 512-bit intermediate multiplication and division.
pub mod full_math;
/// Liquidity <-> token amount conversion for a price range.
pub mod liquidity_amounts;
/// Token deltas between two sqrt prices.
pub mod sqrt_price_math;
/// Tick to sqrt price conversion.
pub mod tick_math;

use primitive_types::U256;

/// `2^96`, the unit of a Q64.96 value.
pub const Q96: U256 = U256([0, 1 << 32, 0, 0]);

/// Number of fractional bits of a Q64.96 value.
pub const RESOLUTION: u32 = 96;
