use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an account, contract or token.
pub type Address = H160;

/// Metadata of one side of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub name: String,
}

impl Token {
    pub fn new(
        address: Address,
        symbol: impl Into<String>,
        decimals: u8,
        name: impl Into<String>,
    ) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
            name: name.into(),
        }
    }
}

/// A pair of token0/token1 amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAmounts {
    pub amount0: U256,
    pub amount1: U256,
}

impl TokenAmounts {
    pub fn new(amount0: impl Into<U256>, amount1: impl Into<U256>) -> Self {
        Self {
            amount0: amount0.into(),
            amount1: amount1.into(),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.amount0.is_zero() && self.amount1.is_zero()
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self {
            amount0: self.amount0.checked_add(other.amount0)?,
            amount1: self.amount1.checked_add(other.amount1)?,
        })
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        Some(Self {
            amount0: self.amount0.checked_sub(other.amount0)?,
            amount1: self.amount1.checked_sub(other.amount1)?,
        })
    }

    /// Component-wise subtraction clamped at zero.
    pub fn saturating_sub(self, other: Self) -> Self {
        Self {
            amount0: self.amount0.saturating_sub(other.amount0),
            amount1: self.amount1.saturating_sub(other.amount1),
        }
    }
}

impl From<(U256, U256)> for TokenAmounts {
    fn from((amount0, amount1): (U256, U256)) -> Self {
        Self { amount0, amount1 }
    }
}

impl fmt::Display for TokenAmounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.amount0, self.amount1)
    }
}
