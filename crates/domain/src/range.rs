//! Validated tick ranges.

use crate::error::{MathError, RangeError};
use crate::math::tick_math::{get_sqrt_ratio_at_tick, is_valid_tick};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `[lower, upper)` tick interval aligned to a pool's tick spacing.
///
/// Construction through [`TickRange::new`] guarantees `lower < upper`, both
/// bounds inside the tick domain and both multiples of the spacing. The
/// spacing is not serialized, so a deserialized range is checked for
/// ordering and domain only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct TickRange {
    lower: i32,
    upper: i32,
}

impl TickRange {
    /// Validates and builds a range for a pool with `tick_spacing`.
    pub fn new(lower: i32, upper: i32, tick_spacing: i32) -> Result<Self, RangeError> {
        if tick_spacing <= 0 {
            return Err(RangeError::InvalidSpacing(tick_spacing));
        }
        if lower >= upper {
            return Err(RangeError::Inverted { lower, upper });
        }
        for tick in [lower, upper] {
            if !is_valid_tick(tick) {
                return Err(RangeError::OutOfDomain(tick));
            }
            if tick % tick_spacing != 0 {
                return Err(RangeError::NotAligned {
                    tick,
                    spacing: tick_spacing,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Lower tick (inclusive).
    #[must_use]
    pub fn lower(&self) -> i32 {
        self.lower
    }

    /// Upper tick (exclusive).
    #[must_use]
    pub fn upper(&self) -> i32 {
        self.upper
    }

    /// Sqrt prices at both bounds.
    pub fn sqrt_ratios(&self) -> Result<(U256, U256), MathError> {
        Ok((
            get_sqrt_ratio_at_tick(self.lower)?,
            get_sqrt_ratio_at_tick(self.upper)?,
        ))
    }
}

/// Unchecked wire form of a [`TickRange`].
#[derive(Deserialize)]
struct RawRange {
    lower: i32,
    upper: i32,
}

impl TryFrom<RawRange> for TickRange {
    type Error = RangeError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.lower, raw.upper, 1)
    }
}

impl fmt::Display for TickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_range() {
        let range = TickRange::new(-1800, 1800, 60).unwrap();
        assert_eq!(range.lower(), -1800);
        assert_eq!(range.upper(), 1800);
        assert_eq!(range.to_string(), "[-1800, 1800]");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            TickRange::new(60, 60, 60),
            Err(RangeError::Inverted {
                lower: 60,
                upper: 60
            })
        );
        assert_eq!(
            TickRange::new(600, 0, 60),
            Err(RangeError::Inverted {
                lower: 600,
                upper: 0
            })
        );
        assert_eq!(
            TickRange::new(0, 90, 60),
            Err(RangeError::NotAligned {
                tick: 90,
                spacing: 60
            })
        );
        assert_eq!(
            TickRange::new(-887_280, 0, 60),
            Err(RangeError::OutOfDomain(-887_280))
        );
        assert_eq!(
            TickRange::new(0, 60, 0),
            Err(RangeError::InvalidSpacing(0))
        );
    }

    #[test]
    fn test_serde_revalidates() {
        let range = TickRange::new(-600, 600, 60).unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, r#"{"lower":-600,"upper":600}"#);
        assert_eq!(serde_json::from_str::<TickRange>(&json).unwrap(), range);

        let inverted = serde_json::from_str::<TickRange>(r#"{"lower":600,"upper":-600}"#);
        assert!(inverted.unwrap_err().to_string().contains("must be below"));
        let out_of_domain = serde_json::from_str::<TickRange>(r#"{"lower":0,"upper":900000}"#);
        assert!(out_of_domain.unwrap_err().to_string().contains("outside"));
    }

    #[test]
    fn test_sqrt_ratios_are_ordered() {
        let (lower, upper) = TickRange::new(-600, 0, 60).unwrap().sqrt_ratios().unwrap();
        assert!(lower < upper);
        assert_eq!(upper, crate::math::Q96);
    }
}
