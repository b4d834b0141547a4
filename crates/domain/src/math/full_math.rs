//! 512-bit intermediate multiplication and division.

use crate::error::MathError;
use primitive_types::{U256, U512};

/// Computes `a * b / denominator` rounding down, keeping the full 512-bit
/// product so intermediate overflow cannot occur.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let quotient = a.full_mul(b) / U512::from(denominator);
    U256::try_from(quotient).map_err(|_| MathError::Overflow)
}

/// Like [`mul_div`] but rounds up when the division leaves a remainder.
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let (quotient, remainder) = a.full_mul(b).div_mod(U512::from(denominator));
    let quotient = if remainder.is_zero() {
        quotient
    } else {
        quotient + U512::one()
    };
    U256::try_from(quotient).map_err(|_| MathError::Overflow)
}

/// Divides `a` by `b`, rounding up.
pub fn div_rounding_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let (quotient, remainder) = a.div_mod(b);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        quotient.checked_add(U256::one()).ok_or(MathError::Overflow)
    }
}

/// Narrows a `U256` to `u128`.
pub fn to_u128(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.low_u128())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_exceeds_256_bit_product() {
        // (2^200 * 2^100) / 2^150 = 2^150, the product alone needs 300 bits
        let a = U256::one() << 200;
        let b = U256::one() << 100;
        let d = U256::one() << 150;
        assert_eq!(mul_div(a, b, d).unwrap(), U256::one() << 150);
    }

    #[test]
    fn test_mul_div_rounding() {
        let seven = U256::from(7u64);
        let two = U256::from(2u64);
        let one = U256::one();
        assert_eq!(mul_div(seven, one, two).unwrap(), U256::from(3u64));
        assert_eq!(mul_div_rounding_up(seven, one, two).unwrap(), U256::from(4u64));
        assert_eq!(mul_div_rounding_up(two, two, two).unwrap(), two);
        assert_eq!(div_rounding_up(seven, two).unwrap(), U256::from(4u64));
    }

    #[test]
    fn test_mul_div_errors() {
        assert_eq!(
            mul_div(U256::one(), U256::one(), U256::zero()),
            Err(MathError::DivisionByZero)
        );
        assert_eq!(
            mul_div(U256::MAX, U256::MAX, U256::one()),
            Err(MathError::Overflow)
        );
    }

    #[test]
    fn test_to_u128() {
        assert_eq!(to_u128(U256::from(42u64)).unwrap(), 42);
        assert_eq!(to_u128(U256::from(u128::MAX)).unwrap(), u128::MAX);
        assert_eq!(
            to_u128(U256::from(u128::MAX) + U256::one()),
            Err(MathError::Overflow)
        );
    }
}
