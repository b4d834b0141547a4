//! Vault and gateway configuration.

use crate::error::{ValidationError, VaultError};
use clmm_vault_domain::token::Address;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Configuration of a single vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Share of collected trading fees skimmed at rebalance, in basis points.
    pub protocol_fee_bps: u32,
    /// Ceiling on cumulative token0 holdings.
    pub deposit_max0: U256,
    /// Ceiling on cumulative token1 holdings.
    pub deposit_max1: U256,
    /// Optional cap on total share supply.
    pub max_total_supply: Option<U256>,
    /// When set, only this address may call `deposit`, and it alone may
    /// pull tokens from third parties through `deposit_from`.
    pub deposit_gateway: Option<Address>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            protocol_fee_bps: 1_000, // 10% of fees
            deposit_max0: U256::MAX,
            deposit_max1: U256::MAX,
            max_total_supply: None,
            deposit_gateway: None,
        }
    }
}

impl VaultConfig {
    /// Sets the protocol fee rate.
    #[must_use]
    pub fn with_protocol_fee_bps(mut self, bps: u32) -> Self {
        self.protocol_fee_bps = bps;
        self
    }

    /// Sets both deposit ceilings.
    #[must_use]
    pub fn with_deposit_max(mut self, max0: U256, max1: U256) -> Self {
        self.deposit_max0 = max0;
        self.deposit_max1 = max1;
        self
    }

    /// Caps the total share supply.
    #[must_use]
    pub fn with_max_total_supply(mut self, max: U256) -> Self {
        self.max_total_supply = Some(max);
        self
    }

    /// Routes deposits through `gateway`.
    #[must_use]
    pub fn with_deposit_gateway(mut self, gateway: Address) -> Self {
        self.deposit_gateway = Some(gateway);
        self
    }

    /// Checks the configuration is usable.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.protocol_fee_bps > BPS_DENOMINATOR {
            return Err(ValidationError::InvalidFeeRate(self.protocol_fee_bps).into());
        }
        if self.deposit_gateway == Some(Address::zero()) {
            return Err(ValidationError::ZeroAddress("deposit_gateway").into());
        }
        Ok(())
    }
}

/// Configuration of the deposit gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Allowed deviation between deposit and vault ratios, in basis points.
    pub ratio_tolerance_bps: u32,
    /// Initial state of the free-deposit toggle.
    pub free_deposit: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ratio_tolerance_bps: 100, // 1%
            free_deposit: false,
        }
    }
}

impl GatewayConfig {
    /// Sets the ratio tolerance.
    #[must_use]
    pub fn with_ratio_tolerance_bps(mut self, bps: u32) -> Self {
        self.ratio_tolerance_bps = bps;
        self
    }

    /// Starts with the ratio check bypassed.
    #[must_use]
    pub fn with_free_deposit(mut self, free_deposit: bool) -> Self {
        self.free_deposit = free_deposit;
        self
    }
}
