//! Deposit gateway guarding vaults against unbalanced deposits.
//!
//! A deposit is accepted only when its `amount1 / amount0` ratio is within
//! the configured tolerance of the vault's current holdings ratio. Vaults
//! must be registered with the gateway before they can receive deposits
//! through it; registrations are permanent.

use crate::config::{BPS_DENOMINATOR, GatewayConfig};
use crate::error::{AuthorizationError, ValidationError, VaultError};
use crate::vault::Vault;
use clmm_vault_domain::error::MathError;
use clmm_vault_domain::math::full_math::mul_div;
use clmm_vault_domain::token::{Address, TokenAmounts};
use clmm_vault_protocols::ledger::TokenLedger;
use clmm_vault_protocols::pool::ConcentratedPool;
use clmm_vault_protocols::transactional::{Transactional, atomically};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Fixed-point scale of deposit ratios.
const RATIO_SCALE: u64 = 1_000_000_000_000_000_000;

/// How a registered vault receives deposits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositRule {
    /// The gateway takes custody of the tokens, deposits on its own account
    /// and forwards the minted shares.
    Relayed,
    /// The vault pulls the tokens straight from the depositor. Requires the
    /// gateway to be the vault's configured deposit gateway.
    Direct,
}

/// Registration record of one vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEntry {
    pub rule: DepositRule,
    /// Largest token0 amount accepted in one deposit.
    pub max_deposit0: U256,
    /// Largest token1 amount accepted in one deposit.
    pub max_deposit1: U256,
}

/// Ratio-checking front door for vault deposits.
#[derive(Debug, Clone)]
pub struct DepositGateway {
    address: Address,
    owner: Address,
    config: GatewayConfig,
    entries: BTreeMap<Address, GatewayEntry>,
}

/// `amount1 * 1e18 / amount0`, clamped to `[0.1e18, 10e18]`. A zero
/// `amount0` maps to the upper clamp.
fn clamped_ratio(amount0: U256, amount1: U256) -> Result<U256, MathError> {
    let scale = U256::from(RATIO_SCALE);
    let min = scale / U256::from(10u64);
    let max = scale * U256::from(10u64);
    if amount0.is_zero() {
        return Ok(max);
    }
    Ok(mul_div(amount1, scale, amount0)?.clamp(min, max))
}

/// Whether depositing `amount0 : amount1` into a vault holding `totals`
/// keeps the vault's ratio within `tolerance_bps`.
///
/// An empty vault has no reference ratio and accepts any proportion.
pub fn is_proper_ratio(
    totals: TokenAmounts,
    amount0: U256,
    amount1: U256,
    tolerance_bps: u32,
) -> Result<bool, MathError> {
    if totals.is_zero() {
        return Ok(true);
    }
    let vault_ratio = clamped_ratio(totals.amount0, totals.amount1)?;
    let deposit_ratio = clamped_ratio(amount0, amount1)?;

    let denominator = U256::from(BPS_DENOMINATOR);
    let band = denominator + U256::from(tolerance_bps);
    // ratios are at most 10e18, so these products fit comfortably
    Ok(deposit_ratio * denominator < vault_ratio * band
        && vault_ratio * denominator < deposit_ratio * band)
}

impl DepositGateway {
    pub fn new(address: Address, owner: Address, config: GatewayConfig) -> Result<Self, VaultError> {
        if address.is_zero() {
            return Err(ValidationError::ZeroAddress("gateway").into());
        }
        if owner.is_zero() {
            return Err(ValidationError::ZeroAddress("owner").into());
        }
        info!(
            gateway = ?address,
            owner = ?owner,
            ratio_tolerance_bps = config.ratio_tolerance_bps,
            free_deposit = config.free_deposit,
            "Created deposit gateway"
        );
        Ok(Self {
            address,
            owner,
            config,
            entries: BTreeMap::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Registration record of `vault`, if any.
    pub fn entry(&self, vault: Address) -> Option<&GatewayEntry> {
        self.entries.get(&vault)
    }

    /// Registers `vault` without deposit caps. Owner only; a vault can be
    /// registered once.
    pub fn register_vault(
        &mut self,
        caller: Address,
        vault: Address,
        rule: DepositRule,
    ) -> Result<(), VaultError> {
        self.register_vault_with_caps(caller, vault, rule, U256::MAX, U256::MAX)
    }

    /// Registers `vault` with per-deposit caps. Owner only; a vault can be
    /// registered once.
    pub fn register_vault_with_caps(
        &mut self,
        caller: Address,
        vault: Address,
        rule: DepositRule,
        max_deposit0: U256,
        max_deposit1: U256,
    ) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        if vault.is_zero() {
            return Err(ValidationError::ZeroAddress("vault").into());
        }
        if self.entries.contains_key(&vault) {
            return Err(ValidationError::AlreadyRegistered(vault).into());
        }
        self.entries.insert(
            vault,
            GatewayEntry {
                rule,
                max_deposit0,
                max_deposit1,
            },
        );
        info!(gateway = ?self.address, vault = ?vault, rule = ?rule, "Registered vault");
        Ok(())
    }

    /// Flips the ratio-check bypass for every registered vault. Owner only.
    /// Returns the new state.
    pub fn toggle_free_deposit(&mut self, caller: Address) -> Result<bool, VaultError> {
        self.ensure_owner(caller)?;
        self.config.free_deposit = !self.config.free_deposit;
        info!(gateway = ?self.address, free_deposit = self.config.free_deposit, "Toggled free deposit");
        Ok(self.config.free_deposit)
    }

    pub fn is_free_deposit(&self) -> bool {
        self.config.free_deposit
    }

    /// Hands the owner role to `new_owner`. Owner only.
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(ValidationError::ZeroAddress("owner").into());
        }
        self.owner = new_owner;
        info!(gateway = ?self.address, owner = ?new_owner, "Transferred ownership");
        Ok(())
    }

    /// Deposits `caller`'s tokens into `vault` after checking the deposit
    /// ratio, crediting the minted shares to `recipient`.
    ///
    /// Under [`DepositRule::Relayed`] the caller approves the gateway; under
    /// [`DepositRule::Direct`] the caller approves the vault.
    pub fn deposit<P, L>(
        &self,
        ledger: &mut L,
        vault: &mut Vault<P>,
        caller: Address,
        amount0: U256,
        amount1: U256,
        recipient: Address,
    ) -> Result<U256, VaultError>
    where
        P: ConcentratedPool + Transactional,
        L: TokenLedger + Transactional,
    {
        let entry = *self
            .entries
            .get(&vault.address())
            .ok_or(ValidationError::UnregisteredVault(vault.address()))?;
        if amount0.is_zero() && amount1.is_zero() {
            return Err(ValidationError::ZeroDeposit.into());
        }
        for (token, amount, max) in [
            (0u8, amount0, entry.max_deposit0),
            (1u8, amount1, entry.max_deposit1),
        ] {
            if amount > max {
                return Err(ValidationError::DepositCeilingExceeded {
                    token,
                    requested: amount,
                    max,
                }
                .into());
            }
        }

        if !self.config.free_deposit {
            let totals = vault.get_total_amounts(ledger)?;
            if !is_proper_ratio(totals, amount0, amount1, self.config.ratio_tolerance_bps)? {
                warn!(
                    gateway = ?self.address,
                    vault = ?vault.address(),
                    total0 = %totals.amount0,
                    total1 = %totals.amount1,
                    amount0 = %amount0,
                    amount1 = %amount1,
                    "Rejected deposit with improper ratio"
                );
                return Err(ValidationError::ImproperRatio.into());
            }
        }

        let result = atomically(vault, ledger, |vault, ledger| match entry.rule {
            DepositRule::Relayed => self.relay(ledger, vault, caller, amount0, amount1, recipient),
            DepositRule::Direct => {
                vault.deposit_from(ledger, self.address, caller, amount0, amount1, recipient)
            }
        });
        match &result {
            Ok(shares) => info!(
                gateway = ?self.address,
                vault = ?vault.address(),
                depositor = ?caller,
                recipient = ?recipient,
                rule = ?entry.rule,
                shares = %shares,
                "Gateway deposit"
            ),
            Err(err) => warn!(
                gateway = ?self.address,
                vault = ?vault.address(),
                kind = ?err.kind(),
                error = %err,
                "Gateway deposit reverted"
            ),
        }
        result
    }

    fn relay<P, L>(
        &self,
        ledger: &mut L,
        vault: &mut Vault<P>,
        caller: Address,
        amount0: U256,
        amount1: U256,
        recipient: Address,
    ) -> Result<U256, VaultError>
    where
        P: ConcentratedPool + Transactional,
        L: TokenLedger + Transactional,
    {
        for (token, amount) in [(vault.token0(), amount0), (vault.token1(), amount1)] {
            ledger.transfer_from(token, self.address, caller, self.address, amount)?;
            ledger.approve(token, self.address, vault.address(), amount);
        }
        let shares = vault.deposit(ledger, self.address, amount0, amount1, self.address)?;
        vault.transfer_shares(self.address, recipient, shares)?;
        Ok(shares)
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), VaultError> {
        if caller != self.owner {
            return Err(AuthorizationError::NotOwner { caller }.into());
        }
        Ok(())
    }
}
