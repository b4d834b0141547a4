//! Vault accounting: share issuance and redemption, fee compounding and
//! range rebalancing.
//!
//! Every state-changing entry point runs inside a checkpoint of the vault,
//! its pool and the token ledger; on error all three are restored and the
//! rollback is logged.

use crate::config::{BPS_DENOMINATOR, VaultConfig};
use crate::error::{AuthorizationError, ValidationError, VaultError};
use crate::positions::{PositionManager, PositionManagerSnapshot, PositionSnapshot, Slot};
use crate::shares::ShareLedger;
use clmm_vault_domain::error::MathError;
use clmm_vault_domain::math::full_math::mul_div;
use clmm_vault_domain::price::{Price, value_in_token1};
use clmm_vault_domain::range::TickRange;
use clmm_vault_domain::token::{Address, TokenAmounts};
use clmm_vault_protocols::ledger::TokenLedger;
use clmm_vault_protocols::pool::ConcentratedPool;
use clmm_vault_protocols::transactional::{Transactional, atomically};
use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Parameters of a rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceParams {
    /// New base lower tick.
    pub base_lower: i32,
    /// New base upper tick.
    pub base_upper: i32,
    /// New limit lower tick.
    pub limit_lower: i32,
    /// New limit upper tick.
    pub limit_upper: i32,
    /// Receives the protocol fee skim.
    pub fee_recipient: Address,
    /// Internal trade before redeploying: positive sells token0, negative
    /// sells token1, zero skips.
    pub swap_quantity: i128,
}

/// Outcome of a rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    /// Fees collected from both positions.
    pub fees_collected: TokenAmounts,
    /// Part of the fees sent to the fee recipient.
    pub fees_skimmed: TokenAmounts,
    /// Amounts exchanged by the internal trade, `(in, out)`.
    pub swapped: Option<(U256, U256)>,
    /// Liquidity minted into the new base range.
    pub base_liquidity: u128,
    /// Liquidity minted into the new limit range.
    pub limit_liquidity: u128,
    /// Tokens left idle after deployment.
    pub idle: TokenAmounts,
}

/// Outcome of a compound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundReport {
    /// Fees collected from both positions.
    pub fees_collected: TokenAmounts,
    /// Liquidity added to the base range.
    pub liquidity_added: u128,
}

/// Serializable view of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSummary {
    pub address: Address,
    pub owner: Address,
    pub tick: i32,
    /// Raw-unit price, `None` when it exceeds what a `Decimal` can hold.
    pub price: Option<Decimal>,
    pub total_supply: U256,
    pub total_amounts: TokenAmounts,
    pub idle: TokenAmounts,
    pub base: PositionSnapshot,
    pub limit: PositionSnapshot,
}

/// A vault managing one base and one limit position in a pool on behalf
/// of its share holders.
#[derive(Debug, Clone)]
pub struct Vault<P> {
    address: Address,
    owner: Address,
    config: VaultConfig,
    positions: PositionManager<P>,
    shares: ShareLedger,
}

/// Captured state of a [`Vault`].
#[derive(Debug, Clone)]
pub struct VaultSnapshot<S> {
    owner: Address,
    config: VaultConfig,
    positions: PositionManagerSnapshot<S>,
    shares: ShareLedger,
}

impl<P: ConcentratedPool + Transactional> Vault<P> {
    /// Creates an empty vault at `address` managing liquidity in `pool`.
    pub fn new(
        address: Address,
        owner: Address,
        pool: P,
        config: VaultConfig,
    ) -> Result<Self, VaultError> {
        if address.is_zero() {
            return Err(ValidationError::ZeroAddress("vault").into());
        }
        if owner.is_zero() {
            return Err(ValidationError::ZeroAddress("owner").into());
        }
        config.validate()?;

        info!(
            vault = ?address,
            pool = ?pool.address(),
            owner = ?owner,
            protocol_fee_bps = config.protocol_fee_bps,
            "Created vault"
        );
        Ok(Self {
            address,
            owner,
            config,
            positions: PositionManager::new(pool, address),
            shares: ShareLedger::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn token0(&self) -> Address {
        self.positions.pool().token0()
    }

    pub fn token1(&self) -> Address {
        self.positions.pool().token1()
    }

    /// The managed pool.
    pub fn pool(&self) -> &P {
        self.positions.pool()
    }

    /// Mutable access to the managed pool, for driving simulations.
    pub fn pool_mut(&mut self) -> &mut P {
        self.positions.pool_mut()
    }

    pub fn total_supply(&self) -> U256 {
        self.shares.total_supply()
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.shares.balance_of(holder)
    }

    pub fn share_allowance(&self, owner: Address, spender: Address) -> U256 {
        self.shares.allowance(owner, spender)
    }

    /// Tick the pool currently trades in.
    pub fn current_tick(&self) -> i32 {
        self.positions.pool().current_price().tick
    }

    /// Idle balance plus both positions at the current price, including
    /// fees already credited to the positions.
    pub fn get_total_amounts(&self, ledger: &dyn TokenLedger) -> Result<TokenAmounts, VaultError> {
        Ok(self.positions.total_amounts(ledger)?)
    }

    pub fn get_base_position(&self) -> Result<PositionSnapshot, VaultError> {
        Ok(self.positions.position(Slot::Base)?)
    }

    pub fn get_limit_position(&self) -> Result<PositionSnapshot, VaultError> {
        Ok(self.positions.position(Slot::Limit)?)
    }

    /// Fees accrued by both positions and not yet collected. Credits
    /// accrued fees to the positions as a side effect.
    pub fn pending_fees(&mut self) -> Result<TokenAmounts, VaultError> {
        self.positions.pending_fees()
    }

    /// Serializable view of the vault.
    pub fn summary(&self, ledger: &dyn TokenLedger) -> Result<VaultSummary, VaultError> {
        let price = self.positions.pool().current_price();
        Ok(VaultSummary {
            address: self.address,
            owner: self.owner,
            tick: price.tick,
            price: Price::from_sqrt_price_x96(price.sqrt_price_x96)
                .ok()
                .map(|p| p.value),
            total_supply: self.shares.total_supply(),
            total_amounts: self.get_total_amounts(ledger)?,
            idle: self.positions.idle(ledger),
            base: self.get_base_position()?,
            limit: self.get_limit_position()?,
        })
    }

    /// Deposits tokens pulled from `caller` and mints shares to `recipient`.
    ///
    /// The caller must have approved the vault for both amounts. When a
    /// deposit gateway is configured, only the gateway may call this.
    pub fn deposit<L>(
        &mut self,
        ledger: &mut L,
        caller: Address,
        amount0: U256,
        amount1: U256,
        recipient: Address,
    ) -> Result<U256, VaultError>
    where
        L: TokenLedger + Transactional,
    {
        if let Some(gateway) = self.config.deposit_gateway {
            if caller != gateway {
                return Err(AuthorizationError::NotDepositGateway { caller }.into());
            }
        }
        self.atomic(ledger, "deposit", |vault, ledger| {
            vault.deposit_inner(ledger, caller, amount0, amount1, recipient)
        })
    }

    /// Deposits tokens pulled from `from`, which must have approved the
    /// vault. Only the configured deposit gateway may call this.
    pub fn deposit_from<L>(
        &mut self,
        ledger: &mut L,
        caller: Address,
        from: Address,
        amount0: U256,
        amount1: U256,
        recipient: Address,
    ) -> Result<U256, VaultError>
    where
        L: TokenLedger + Transactional,
    {
        if self.config.deposit_gateway != Some(caller) {
            return Err(AuthorizationError::NotDepositGateway { caller }.into());
        }
        self.atomic(ledger, "deposit_from", |vault, ledger| {
            vault.deposit_inner(ledger, from, amount0, amount1, recipient)
        })
    }

    fn deposit_inner(
        &mut self,
        ledger: &mut dyn TokenLedger,
        from: Address,
        amount0: U256,
        amount1: U256,
        recipient: Address,
    ) -> Result<U256, VaultError> {
        if amount0.is_zero() && amount1.is_zero() {
            return Err(ValidationError::ZeroDeposit.into());
        }
        self.check_recipient(recipient)?;

        self.positions.poke()?;
        let sqrt_price = self.positions.pool().current_price().sqrt_price_x96;
        let totals = self.positions.total_amounts(ledger)?;

        for (token, held, amount, max) in [
            (0u8, totals.amount0, amount0, self.config.deposit_max0),
            (1u8, totals.amount1, amount1, self.config.deposit_max1),
        ] {
            let after = held.checked_add(amount).ok_or(MathError::Overflow)?;
            if after > max {
                return Err(ValidationError::DepositCeilingExceeded {
                    token,
                    requested: after,
                    max,
                }
                .into());
            }
        }

        let deposit = TokenAmounts::new(amount0, amount1);
        let deposit_value = value_in_token1(sqrt_price, deposit)?;
        let supply = self.shares.total_supply();
        let shares = if supply.is_zero() {
            deposit_value
        } else {
            let vault_value = value_in_token1(sqrt_price, totals)?;
            mul_div(deposit_value, supply, vault_value)?
        };
        if shares.is_zero() {
            return Err(ValidationError::ZeroShares.into());
        }
        if let Some(max) = self.config.max_total_supply {
            if supply.checked_add(shares).ok_or(MathError::Overflow)? > max {
                return Err(ValidationError::MaxTotalSupplyExceeded { max }.into());
            }
        }

        let (token0, token1) = (self.token0(), self.token1());
        ledger.transfer_from(token0, self.address, from, self.address, amount0)?;
        ledger.transfer_from(token1, self.address, from, self.address, amount1)?;
        self.shares.mint(recipient, shares)?;

        info!(
            vault = ?self.address,
            from = ?from,
            recipient = ?recipient,
            amount0 = %amount0,
            amount1 = %amount1,
            shares = %shares,
            "Deposit"
        );
        Ok(shares)
    }

    /// Burns `shares` of `owner` and sends the proportional slice of idle
    /// tokens and of both positions to `recipient`.
    ///
    /// `caller` must be `owner` or hold a sufficient share allowance.
    pub fn withdraw<L>(
        &mut self,
        ledger: &mut L,
        caller: Address,
        shares: U256,
        recipient: Address,
        owner: Address,
    ) -> Result<TokenAmounts, VaultError>
    where
        L: TokenLedger + Transactional,
    {
        self.atomic(ledger, "withdraw", |vault, ledger| {
            vault.withdraw_inner(ledger, caller, shares, recipient, owner)
        })
    }

    fn withdraw_inner(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        shares: U256,
        recipient: Address,
        owner: Address,
    ) -> Result<TokenAmounts, VaultError> {
        if shares.is_zero() {
            return Err(ValidationError::ZeroWithdrawal.into());
        }
        self.check_recipient(recipient)?;
        let supply = self.shares.total_supply();
        if supply.is_zero() {
            return Err(ValidationError::EmptySupply.into());
        }
        let available = self.shares.balance_of(owner);
        if available < shares {
            return Err(ValidationError::InsufficientShares {
                available,
                required: shares,
            }
            .into());
        }
        if caller != owner {
            self.shares.spend_allowance(owner, caller, shares)?;
        }

        self.positions.poke()?;
        let idle = self.positions.idle(ledger);
        let unused = TokenAmounts {
            amount0: mul_div(idle.amount0, shares, supply)?,
            amount1: mul_div(idle.amount1, shares, supply)?,
        };

        let base = self
            .positions
            .withdraw_fraction(ledger, Slot::Base, shares, supply, recipient)?;
        let limit = self
            .positions
            .withdraw_fraction(ledger, Slot::Limit, shares, supply, recipient)?;

        let (token0, token1) = (self.token0(), self.token1());
        ledger.transfer(token0, self.address, recipient, unused.amount0)?;
        ledger.transfer(token1, self.address, recipient, unused.amount1)?;
        self.shares.burn(owner, shares)?;

        let total = unused
            .checked_add(base)
            .and_then(|sum| sum.checked_add(limit))
            .ok_or(MathError::Overflow)?;
        info!(
            vault = ?self.address,
            owner = ?owner,
            recipient = ?recipient,
            shares = %shares,
            amount0 = %total.amount0,
            amount1 = %total.amount1,
            "Withdraw"
        );
        Ok(total)
    }

    /// Collects fees from both positions and redeploys exactly those
    /// amounts into the base range. Mints no shares. Anyone may call it.
    pub fn compound<L>(&mut self, ledger: &mut L, caller: Address) -> Result<CompoundReport, VaultError>
    where
        L: TokenLedger + Transactional,
    {
        self.atomic(ledger, "compound", |vault, ledger| {
            let base_fees = vault.positions.collect_fees(ledger, Slot::Base)?;
            let limit_fees = vault.positions.collect_fees(ledger, Slot::Limit)?;
            let fees = base_fees
                .checked_add(limit_fees)
                .ok_or(MathError::Overflow)?;
            if fees.is_zero() {
                return Ok(CompoundReport::default());
            }

            let liquidity_added = match vault.positions.range(Slot::Base) {
                Some(range) => vault.positions.deploy(ledger, Slot::Base, range, fees)?.0,
                None => 0,
            };

            info!(
                vault = ?vault.address,
                caller = ?caller,
                fee0 = %fees.amount0,
                fee1 = %fees.amount1,
                liquidity_added,
                "Compounded fees"
            );
            Ok(CompoundReport {
                fees_collected: fees,
                liquidity_added,
            })
        })
    }

    /// Moves all liquidity into new base and limit ranges. Owner only.
    ///
    /// Both positions are withdrawn in full, the optional internal trade is
    /// executed, the protocol fee is skimmed from the collected fees, then
    /// the base range is funded with as much idle as the price allows and
    /// the limit range with the rest.
    pub fn rebalance<L>(
        &mut self,
        ledger: &mut L,
        caller: Address,
        params: RebalanceParams,
    ) -> Result<RebalanceReport, VaultError>
    where
        L: TokenLedger + Transactional,
    {
        self.ensure_owner(caller)?;
        let spacing = self.positions.pool().tick_spacing();
        let base = TickRange::new(params.base_lower, params.base_upper, spacing)?;
        let limit = TickRange::new(params.limit_lower, params.limit_upper, spacing)?;
        if base == limit {
            return Err(ValidationError::IdenticalRanges.into());
        }
        if params.fee_recipient.is_zero() {
            return Err(ValidationError::ZeroAddress("fee_recipient").into());
        }

        self.atomic(ledger, "rebalance", |vault, ledger| {
            vault.rebalance_inner(ledger, base, limit, params)
        })
    }

    fn rebalance_inner(
        &mut self,
        ledger: &mut dyn TokenLedger,
        base: TickRange,
        limit: TickRange,
        params: RebalanceParams,
    ) -> Result<RebalanceReport, VaultError> {
        let old_base = self.positions.range(Slot::Base);
        let old_limit = self.positions.range(Slot::Limit);

        let base_out = self.positions.withdraw_all(ledger, Slot::Base)?;
        let limit_out = self.positions.withdraw_all(ledger, Slot::Limit)?;
        let fees = base_out
            .fees
            .checked_add(limit_out.fees)
            .ok_or(MathError::Overflow)?;

        let swapped = if params.swap_quantity == 0 {
            None
        } else {
            let zero_for_one = params.swap_quantity > 0;
            let amount_in = U256::from(params.swap_quantity.unsigned_abs());
            let result = self.positions.swap(ledger, zero_for_one, amount_in)?;
            Some((result.amount_in, result.amount_out))
        };

        let rate = U256::from(self.config.protocol_fee_bps);
        let denominator = U256::from(BPS_DENOMINATOR);
        let skim = TokenAmounts {
            amount0: mul_div(fees.amount0, rate, denominator)?,
            amount1: mul_div(fees.amount1, rate, denominator)?,
        };
        let (token0, token1) = (self.token0(), self.token1());
        ledger.transfer(token0, self.address, params.fee_recipient, skim.amount0)?;
        ledger.transfer(token1, self.address, params.fee_recipient, skim.amount1)?;

        let idle = self.positions.idle(ledger);
        let (base_liquidity, _) = self.positions.deploy(ledger, Slot::Base, base, idle)?;
        let idle = self.positions.idle(ledger);
        let (limit_liquidity, _) = self.positions.deploy(ledger, Slot::Limit, limit, idle)?;
        let idle = self.positions.idle(ledger);

        info!(
            vault = ?self.address,
            old_base = ?old_base.map(|r| r.to_string()),
            old_limit = ?old_limit.map(|r| r.to_string()),
            new_base = %base,
            new_limit = %limit,
            fees = %fees,
            skimmed = %skim,
            base_liquidity,
            limit_liquidity,
            "Rebalanced"
        );
        Ok(RebalanceReport {
            fees_collected: fees,
            fees_skimmed: skim,
            swapped,
            base_liquidity,
            limit_liquidity,
            idle,
        })
    }

    /// Pulls all liquidity of `slot` into idle, fees included. Owner only.
    pub fn emergency_burn<L>(
        &mut self,
        ledger: &mut L,
        caller: Address,
        slot: Slot,
    ) -> Result<TokenAmounts, VaultError>
    where
        L: TokenLedger + Transactional,
    {
        self.ensure_owner(caller)?;
        if self.positions.range(slot).is_none() {
            return Err(ValidationError::NoActiveRange(slot).into());
        }
        self.atomic(ledger, "emergency_burn", |vault, ledger| {
            let withdrawn = vault.positions.withdraw_all(ledger, slot)?;
            warn!(
                vault = ?vault.address,
                slot = %slot,
                liquidity = withdrawn.liquidity,
                collected = %withdrawn.collected,
                "Emergency burn"
            );
            Ok(withdrawn.collected)
        })
    }

    /// Sets the per-token holding ceilings. Owner only.
    pub fn set_deposit_max(
        &mut self,
        caller: Address,
        max0: U256,
        max1: U256,
    ) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        self.config.deposit_max0 = max0;
        self.config.deposit_max1 = max1;
        info!(vault = ?self.address, max0 = %max0, max1 = %max1, "Updated deposit ceilings");
        Ok(())
    }

    /// Sets or clears the share supply cap. Owner only.
    pub fn set_max_total_supply(
        &mut self,
        caller: Address,
        max: Option<U256>,
    ) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        self.config.max_total_supply = max;
        info!(vault = ?self.address, max = ?max, "Updated max total supply");
        Ok(())
    }

    /// Sets or clears the deposit gateway. Owner only.
    pub fn set_deposit_gateway(
        &mut self,
        caller: Address,
        gateway: Option<Address>,
    ) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        if gateway == Some(Address::zero()) {
            return Err(ValidationError::ZeroAddress("deposit_gateway").into());
        }
        self.config.deposit_gateway = gateway;
        info!(vault = ?self.address, gateway = ?gateway, "Updated deposit gateway");
        Ok(())
    }

    /// Hands the owner role to `new_owner`. Owner only.
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(ValidationError::ZeroAddress("owner").into());
        }
        self.owner = new_owner;
        info!(vault = ?self.address, owner = ?new_owner, "Transferred ownership");
        Ok(())
    }

    /// Moves shares between holders.
    pub fn transfer_shares(
        &mut self,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), VaultError> {
        self.shares.transfer(caller, to, amount)
    }

    /// Lets `spender` withdraw up to `amount` of `caller`'s shares.
    pub fn approve_shares(&mut self, caller: Address, spender: Address, amount: U256) {
        self.shares.approve(caller, spender, amount);
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), VaultError> {
        if caller != self.owner {
            return Err(AuthorizationError::NotOwner { caller }.into());
        }
        Ok(())
    }

    fn check_recipient(&self, recipient: Address) -> Result<(), VaultError> {
        if recipient.is_zero() {
            return Err(ValidationError::ZeroAddress("recipient").into());
        }
        if recipient == self.address {
            return Err(ValidationError::InvalidRecipient(recipient).into());
        }
        Ok(())
    }

    fn atomic<L, T>(
        &mut self,
        ledger: &mut L,
        operation: &'static str,
        f: impl FnOnce(&mut Self, &mut L) -> Result<T, VaultError>,
    ) -> Result<T, VaultError>
    where
        L: TokenLedger + Transactional,
    {
        let result = atomically(self, ledger, f);
        if let Err(err) = &result {
            warn!(
                vault = ?self.address,
                operation,
                kind = ?err.kind(),
                error = %err,
                "Operation reverted"
            );
        }
        result
    }
}

impl<P: ConcentratedPool + Transactional> Transactional for Vault<P> {
    type Snapshot = VaultSnapshot<P::Snapshot>;

    fn snapshot(&self) -> Self::Snapshot {
        VaultSnapshot {
            owner: self.owner,
            config: self.config.clone(),
            positions: self.positions.snapshot(),
            shares: self.shares.clone(),
        }
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        self.owner = snapshot.owner;
        self.config = snapshot.config;
        self.positions.restore(snapshot.positions);
        self.shares = snapshot.shares;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::*;
    use clmm_vault_protocols::ledger::LedgerError;
    use clmm_vault_protocols::pool::{
        CallbackError, PoolCallback, PoolError, PoolPrice, PositionInfo, SwapResult,
    };
    use clmm_vault_protocols::simulated::SimulatedPool;

    #[test]
    fn test_first_deposit_mints_value_shares() {
        let mut f = Fixture::new();
        let shares = f.deposit(ALICE, U256::from(1_000u64), U256::from(1_000u64));
        assert_eq!(shares, U256::from(2_000u64));
        assert_eq!(f.vault.balance_of(addr(ALICE)), shares);
        assert_eq!(f.vault.total_supply(), shares);
        assert_eq!(f.totals(), amounts(U256::from(1_000u64), U256::from(1_000u64)));

        // later deposits are priced against the vault's value
        let shares = f.deposit(BOB, U256::from(500u64), U256::from(500u64));
        assert_eq!(shares, U256::from(1_000u64));

        // the vault accepts any proportion; only the gateway guards ratios
        let shares = f.deposit(USERS[2], U256::from(300u64), U256::zero());
        assert_eq!(shares, U256::from(300u64));
    }

    #[test]
    fn test_deposit_then_withdraw_returns_idle_amounts() {
        let mut f = Fixture::new();
        let before0 = f.balance(TOKEN0, ALICE);
        f.deposit(ALICE, U256::from(1_000u64), U256::from(1_000u64));
        let out = f.withdraw_all(ALICE);
        assert_eq!(out, amounts(U256::from(1_000u64), U256::from(1_000u64)));
        assert_eq!(f.balance(TOKEN0, ALICE), before0);
        assert!(f.vault.total_supply().is_zero());
    }

    #[test]
    fn test_deposit_withdraw_round_trip_with_live_positions() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(10_000), e18(10_000));
        f.rebalance(-1800, 1800, 0, 600);

        let totals = f.totals();
        let supply = f.vault.total_supply();
        let shares = f.deposit(BOB, e18(10_000), e18(10_000));
        // shares are proportional to value contributed vs value held
        let expected = mul_div(e18(20_000), supply, totals.amount0 + totals.amount1).unwrap();
        assert_eq!(shares, expected);

        let out = f.withdraw_all(BOB);
        assert_amounts_close(out, amounts(e18(10_000), e18(10_000)), 10);
        assert!(out.amount0 <= e18(10_000) + U256::from(10u64));
    }

    #[test]
    fn test_five_holders_recover_their_deposits() {
        let mut f = Fixture::new();
        let deposit = e18(10_000);
        for user in &USERS[..3] {
            f.deposit(*user, deposit, deposit);
        }
        f.rebalance(-1800, 1800, 0, 600);
        for user in &USERS[3..] {
            f.deposit(*user, deposit, deposit);
        }

        for user in USERS {
            let before = amounts(f.balance(TOKEN0, user), f.balance(TOKEN1, user));
            let out = f.withdraw_all(user);
            assert_amounts_close(out, amounts(deposit, deposit), 20);
            let after = amounts(f.balance(TOKEN0, user), f.balance(TOKEN1, user));
            assert_eq!(after.checked_sub(before), Some(out));
        }
        assert!(f.vault.total_supply().is_zero());
    }

    #[test]
    fn test_rebalance_conserves_value_and_skims_fees() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(10_000), e18(10_000));
        let report = f.rebalance(-1800, 1800, 0, 600);
        assert!(report.base_liquidity > 0);
        assert!(report.fees_collected.is_zero());
        assert_amounts_close(f.totals(), amounts(e18(10_000), e18(10_000)), 4);
        assert_amounts_close(report.idle, TokenAmounts::zero(), 2);

        f.accrue_fees(e18(100), e18(50));
        let pending = f.vault.pending_fees().unwrap();
        assert_amounts_close(pending, amounts(e18(100), e18(50)), 4);
        let with_fees = f.totals();

        let report = f.rebalance(-3000, 3000, 0, 600);
        assert_eq!(report.fees_collected, pending);
        // token0 surplus from the fees moves into the limit range
        assert!(report.limit_liquidity > 0);
        assert_amounts_close(report.idle, TokenAmounts::zero(), 4);
        let expected_skim = amounts(
            mul_div(pending.amount0, U256::from(1_000u64), U256::from(10_000u64)).unwrap(),
            mul_div(pending.amount1, U256::from(1_000u64), U256::from(10_000u64)).unwrap(),
        );
        assert_eq!(report.fees_skimmed, expected_skim);
        assert_eq!(f.balance(TOKEN0, FEE_RECIPIENT), expected_skim.amount0);
        assert_eq!(f.balance(TOKEN1, FEE_RECIPIENT), expected_skim.amount1);

        let expected = with_fees.checked_sub(expected_skim).unwrap();
        assert_amounts_close(f.totals(), expected, 4);
        assert_eq!(
            f.vault.get_base_position().unwrap().range,
            Some(TickRange::new(-3000, 3000, 60).unwrap())
        );
        assert_eq!(
            f.vault.get_limit_position().unwrap().range,
            Some(TickRange::new(0, 600, 60).unwrap())
        );
    }

    #[test]
    fn test_rebalance_swap_hint() {
        let mut f = Fixture::new();
        f.seed_reserves(e18(1_000), e18(1_000));
        f.deposit(ALICE, e18(10_000), e18(10_000));

        let mut params = rebalance_params(-1800, 1800, 0, 600);
        params.swap_quantity = 100_000_000_000_000_000_000; // 100 token0
        let report = f
            .vault
            .rebalance(&mut f.ledger, addr(OWNER), params)
            .unwrap();
        // 0.3% fee at price 1
        assert_eq!(report.swapped, Some((e18(100), e18(997) / U256::from(10u64))));
        assert_amounts_close(
            f.totals(),
            amounts(e18(9_900), e18(10_000) + e18(997) / U256::from(10u64)),
            4,
        );
    }

    #[test]
    fn test_rebalance_after_price_move_deploys_single_sided() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(10_000), e18(10_000));
        f.rebalance(-1800, 1800, 0, 600);

        // both ranges end up above the price and hold token0 only
        f.move_to_tick(-3000);
        let before = f.totals();
        assert!(before.amount0 > e18(20_000));
        assert_close(before.amount1, U256::zero(), 10);

        let report = f.rebalance(-1800, 1800, -3060, -3000);
        assert!(report.fees_collected.is_zero());
        assert_eq!(report.limit_liquidity, 0);
        assert_amounts_close(f.totals(), before, 10);

        let summary = f.vault.summary(&f.ledger).unwrap();
        assert_eq!(summary.tick, -3000);
        assert_amounts_close(summary.idle, TokenAmounts::zero(), 10);
        assert!(summary.base.liquidity > 0);
        // nothing left in token1 for a limit range below the price
        assert_eq!(summary.limit.liquidity, 0);
        assert_eq!(
            summary.limit.range,
            Some(TickRange::new(-3060, -3000, 60).unwrap())
        );

        let bob_before = f.balance(TOKEN0, BOB);
        let shares = f.deposit(BOB, e18(1_000), U256::zero());
        assert!(!shares.is_zero());
        let out = f.withdraw_all(BOB);
        assert_close(out.amount0, e18(1_000), 10);
        assert_close(out.amount1, U256::zero(), 10);
        assert!(f.balance(TOKEN0, BOB) <= bob_before);
        assert_close(f.balance(TOKEN0, BOB), bob_before, 10);

        let alice = f.withdraw_all(ALICE);
        assert_amounts_close(alice, before, 20);
        assert!(f.vault.total_supply().is_zero());
    }

    #[test]
    fn test_compound_reinvests_fees_once() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(10_000), e18(10_000));
        f.rebalance(-1800, 1800, 0, 600);
        let before = f.totals();
        let liquidity_before = f.vault.get_base_position().unwrap().liquidity;

        f.accrue_fees(e18(10), e18(10));
        let report = f.vault.compound(&mut f.ledger, addr(BOB)).unwrap();
        assert_amounts_close(report.fees_collected, amounts(e18(10), e18(10)), 2);
        assert!(report.liquidity_added > 0);
        assert_eq!(
            f.vault.get_base_position().unwrap().liquidity,
            liquidity_before + report.liquidity_added
        );
        let after = f.totals();
        assert!(after.amount0 > before.amount0);
        assert!(after.amount1 > before.amount1);
        assert_eq!(f.vault.total_supply(), e18(20_000));

        let again = f.vault.compound(&mut f.ledger, addr(BOB)).unwrap();
        assert_eq!(again, CompoundReport::default());
        assert_eq!(f.totals(), after);
    }

    #[test]
    fn test_compound_without_base_range_keeps_fees_idle() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(1), e18(1));
        let report = f.vault.compound(&mut f.ledger, addr(ALICE)).unwrap();
        assert_eq!(report, CompoundReport::default());
        assert_eq!(f.totals(), amounts(e18(1), e18(1)));
    }

    #[test]
    fn test_withdraw_by_approved_spender() {
        let mut f = Fixture::new();
        f.deposit(ALICE, U256::from(1_000u64), U256::from(1_000u64));

        let err = f
            .vault
            .withdraw(&mut f.ledger, addr(BOB), U256::from(500u64), addr(BOB), addr(ALICE))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        f.vault
            .approve_shares(addr(ALICE), addr(BOB), U256::from(500u64));
        let bob_before = f.balance(TOKEN0, BOB);
        let out = f
            .vault
            .withdraw(&mut f.ledger, addr(BOB), U256::from(500u64), addr(BOB), addr(ALICE))
            .unwrap();
        assert_eq!(out, amounts(U256::from(250u64), U256::from(250u64)));
        assert_eq!(f.balance(TOKEN0, BOB), bob_before + U256::from(250u64));
        assert!(f.vault.share_allowance(addr(ALICE), addr(BOB)).is_zero());
        assert_eq!(f.vault.balance_of(addr(ALICE)), U256::from(1_500u64));
    }

    #[test]
    fn test_withdraw_validation() {
        let mut f = Fixture::new();
        let err = f
            .vault
            .withdraw(&mut f.ledger, addr(ALICE), U256::one(), addr(ALICE), addr(ALICE))
            .unwrap_err();
        assert_eq!(err, VaultError::from(ValidationError::EmptySupply));

        f.deposit(ALICE, U256::from(1_000u64), U256::from(1_000u64));
        let cases = [
            (U256::zero(), addr(ALICE), ValidationError::ZeroWithdrawal),
            (
                U256::from(2_001u64),
                addr(ALICE),
                ValidationError::InsufficientShares {
                    available: U256::from(2_000u64),
                    required: U256::from(2_001u64),
                },
            ),
            (
                U256::one(),
                Address::zero(),
                ValidationError::ZeroAddress("recipient"),
            ),
        ];
        for (shares, recipient, expected) in cases {
            let err = f
                .vault
                .withdraw(&mut f.ledger, addr(ALICE), shares, recipient, addr(ALICE))
                .unwrap_err();
            assert_eq!(err, VaultError::from(expected));
        }
    }

    #[test]
    fn test_deposit_validation() {
        let mut f = Fixture::new();
        let err = f
            .vault
            .deposit(&mut f.ledger, addr(ALICE), U256::zero(), U256::zero(), addr(ALICE))
            .unwrap_err();
        assert_eq!(err, VaultError::from(ValidationError::ZeroDeposit));

        let err = f
            .vault
            .deposit(&mut f.ledger, addr(ALICE), U256::one(), U256::one(), addr(VAULT))
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::from(ValidationError::InvalidRecipient(addr(VAULT)))
        );

        // funded but never approved the vault
        let stranger = addr(777);
        f.ledger
            .mint(addr(TOKEN0), stranger, U256::from(1_000u64))
            .unwrap();
        let err = f
            .vault
            .deposit(&mut f.ledger, stranger, U256::from(1_000u64), U256::zero(), stranger)
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Authorization(AuthorizationError::TokenAllowance(
                LedgerError::InsufficientAllowance { .. }
            ))
        ));

        // approved but unfunded
        f.ledger
            .approve(addr(TOKEN1), stranger, addr(VAULT), U256::MAX);
        let err = f
            .vault
            .deposit(&mut f.ledger, stranger, U256::zero(), U256::from(1_000u64), stranger)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_deposit_too_small_for_a_share() {
        let mut f = Fixture::new();
        f.deposit(ALICE, U256::from(1_000u64), U256::from(1_000u64));
        // a donation raises the share price far above one token unit
        f.ledger
            .transfer(addr(TOKEN0), addr(BOB), addr(VAULT), U256::from(1_000_000u64))
            .unwrap();
        let err = f
            .vault
            .deposit(&mut f.ledger, addr(BOB), U256::zero(), U256::one(), addr(BOB))
            .unwrap_err();
        assert_eq!(err, VaultError::from(ValidationError::ZeroShares));
    }

    #[test]
    fn test_deposit_ceilings_and_supply_cap() {
        let mut f = Fixture::new();
        f.vault
            .set_deposit_max(addr(OWNER), U256::from(1_500u64), U256::MAX)
            .unwrap();
        f.deposit(ALICE, U256::from(1_000u64), U256::from(1_000u64));

        let err = f
            .vault
            .deposit(&mut f.ledger, addr(BOB), U256::from(1_000u64), U256::zero(), addr(BOB))
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::from(ValidationError::DepositCeilingExceeded {
                token: 0,
                requested: U256::from(2_000u64),
                max: U256::from(1_500u64),
            })
        );

        f.vault
            .set_max_total_supply(addr(OWNER), Some(U256::from(2_500u64)))
            .unwrap();
        let err = f
            .vault
            .deposit(&mut f.ledger, addr(BOB), U256::zero(), U256::from(1_000u64), addr(BOB))
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::from(ValidationError::MaxTotalSupplyExceeded {
                max: U256::from(2_500u64)
            })
        );
        assert_eq!(f.vault.total_supply(), U256::from(2_000u64));
    }

    #[test]
    fn test_owner_only_operations() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(1), e18(1));
        let intruder = addr(BOB);
        let not_owner: VaultError = AuthorizationError::NotOwner { caller: intruder }.into();

        let params = rebalance_params(-1800, 1800, 0, 600);
        assert_eq!(
            f.vault.rebalance(&mut f.ledger, intruder, params),
            Err(not_owner)
        );
        assert_eq!(
            f.vault.set_deposit_max(intruder, U256::one(), U256::one()),
            Err(not_owner)
        );
        assert_eq!(f.vault.set_max_total_supply(intruder, None), Err(not_owner));
        assert_eq!(
            f.vault.set_deposit_gateway(intruder, Some(intruder)),
            Err(not_owner)
        );
        assert_eq!(
            f.vault.transfer_ownership(intruder, intruder),
            Err(not_owner)
        );
        assert_eq!(
            f.vault.emergency_burn(&mut f.ledger, intruder, Slot::Base),
            Err(not_owner)
        );

        f.vault.transfer_ownership(addr(OWNER), intruder).unwrap();
        assert_eq!(f.vault.owner(), intruder);
        assert!(f.vault.rebalance(&mut f.ledger, intruder, params).is_ok());
    }

    #[test]
    fn test_rebalance_validation_leaves_ranges_untouched() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(1), e18(1));
        let owner = addr(OWNER);

        let err = f
            .vault
            .rebalance(&mut f.ledger, owner, rebalance_params(-1800, 1810, 0, 600))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = f
            .vault
            .rebalance(&mut f.ledger, owner, rebalance_params(600, -600, 0, 600))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = f
            .vault
            .rebalance(&mut f.ledger, owner, rebalance_params(0, 600, 0, 600))
            .unwrap_err();
        assert_eq!(err, VaultError::from(ValidationError::IdenticalRanges));

        let mut params = rebalance_params(-1800, 1800, 0, 600);
        params.fee_recipient = Address::zero();
        let err = f.vault.rebalance(&mut f.ledger, owner, params).unwrap_err();
        assert_eq!(
            err,
            VaultError::from(ValidationError::ZeroAddress("fee_recipient"))
        );

        assert_eq!(f.vault.get_base_position().unwrap().range, None);
        assert_eq!(f.vault.get_limit_position().unwrap().range, None);
    }

    #[test]
    fn test_failed_rebalance_rolls_back_everything() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(10_000), e18(10_000));
        f.rebalance(-1800, 1800, 0, 600);

        let ledger_before = f.ledger.clone();
        let pool_before = f.vault.pool().clone();
        let base_before = f.vault.get_base_position().unwrap();

        // no reserves seeded, so the internal trade cannot be filled
        let mut params = rebalance_params(-3000, 3000, -600, 0);
        params.swap_quantity = -1_000_000_000_000_000_000;
        let err = f
            .vault
            .rebalance(&mut f.ledger, addr(OWNER), params)
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::from(ValidationError::PoolRejected(
                PoolError::InsufficientReserves
            ))
        );

        assert_eq!(f.ledger, ledger_before);
        assert_eq!(f.vault.pool(), &pool_before);
        assert_eq!(f.vault.get_base_position().unwrap(), base_before);
    }

    #[test]
    fn test_emergency_burn_moves_liquidity_to_idle() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(10_000), e18(10_000));
        let err = f
            .vault
            .emergency_burn(&mut f.ledger, addr(OWNER), Slot::Base)
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::from(ValidationError::NoActiveRange(Slot::Base))
        );

        f.rebalance(-1800, 1800, 0, 600);
        let before = f.totals();
        let collected = f
            .vault
            .emergency_burn(&mut f.ledger, addr(OWNER), Slot::Base)
            .unwrap();
        assert!(!collected.is_zero());
        assert_eq!(f.vault.get_base_position().unwrap().liquidity, 0);
        assert_amounts_close(f.totals(), before, 2);
    }

    #[test]
    fn test_summary_serializes() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(5), e18(5));
        f.rebalance(-1800, 1800, 0, 600);
        let summary = f.vault.summary(&f.ledger).unwrap();
        assert_eq!(summary.tick, 0);
        assert_eq!(summary.price, Some(Decimal::ONE));
        assert_eq!(summary.total_supply, e18(10));
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("base").is_some());
    }

    #[test]
    fn test_summary_survives_extreme_price() {
        let mut f = Fixture::new();
        f.deposit(ALICE, e18(5), e18(5));
        f.move_to_tick(887_220);
        let summary = f.vault.summary(&f.ledger).unwrap();
        assert_eq!(summary.tick, 887_220);
        assert_eq!(summary.price, None);
        assert_eq!(summary.idle, amounts(e18(5), e18(5)));
    }

    /// Wraps a pool and misbehaves inside `mint`.
    #[derive(Debug, Clone, PartialEq)]
    struct RoguePool {
        inner: SimulatedPool,
        forged_caller: Option<Address>,
        replay: bool,
    }

    impl ConcentratedPool for RoguePool {
        fn address(&self) -> Address {
            self.inner.address()
        }

        fn token0(&self) -> Address {
            self.inner.token0()
        }

        fn token1(&self) -> Address {
            self.inner.token1()
        }

        fn tick_spacing(&self) -> i32 {
            self.inner.tick_spacing()
        }

        fn current_price(&self) -> PoolPrice {
            self.inner.current_price()
        }

        fn position_info(&self, owner: Address, range: TickRange) -> PositionInfo {
            self.inner.position_info(owner, range)
        }

        fn mint(
            &mut self,
            ledger: &mut dyn TokenLedger,
            owner: Address,
            range: TickRange,
            liquidity: u128,
            callback: &mut dyn PoolCallback,
        ) -> Result<TokenAmounts, PoolError> {
            if let Some(forged) = self.forged_caller {
                callback.on_mint(ledger, forged, TokenAmounts::new(1u64, 1u64))?;
            }
            let owed = self.inner.mint(ledger, owner, range, liquidity, callback)?;
            if self.replay {
                callback.on_mint(ledger, self.inner.address(), owed)?;
            }
            Ok(owed)
        }

        fn burn(
            &mut self,
            owner: Address,
            range: TickRange,
            liquidity: u128,
        ) -> Result<TokenAmounts, PoolError> {
            self.inner.burn(owner, range, liquidity)
        }

        fn collect(
            &mut self,
            ledger: &mut dyn TokenLedger,
            owner: Address,
            recipient: Address,
            range: TickRange,
            max: TokenAmounts,
        ) -> Result<TokenAmounts, PoolError> {
            self.inner.collect(ledger, owner, recipient, range, max)
        }

        fn swap(
            &mut self,
            ledger: &mut dyn TokenLedger,
            recipient: Address,
            zero_for_one: bool,
            amount_in: U256,
            callback: &mut dyn PoolCallback,
        ) -> Result<SwapResult, PoolError> {
            self.inner
                .swap(ledger, recipient, zero_for_one, amount_in, callback)
        }
    }

    impl Transactional for RoguePool {
        type Snapshot = Self;

        fn snapshot(&self) -> Self {
            self.clone()
        }

        fn restore(&mut self, snapshot: Self) {
            *self = snapshot;
        }
    }

    fn rogue_fixture(forged_caller: Option<Address>, replay: bool) -> Fixture<RoguePool> {
        let pool = RoguePool {
            inner: pool(),
            forged_caller,
            replay,
        };
        let mut f = Fixture::with_pool(pool, VaultConfig::default());
        f.deposit(ALICE, e18(1_000), e18(1_000));
        f
    }

    #[test]
    fn test_forged_mint_callback_is_rejected() {
        let attacker = addr(666);
        let mut f = rogue_fixture(Some(attacker), false);
        let ledger_before = f.ledger.clone();

        let err = f
            .vault
            .rebalance(&mut f.ledger, addr(OWNER), rebalance_params(-1800, 1800, 0, 600))
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::Reentrancy(CallbackError::UnexpectedCaller {
                expected: addr(POOL),
                actual: attacker,
            })
        );
        assert_eq!(err.kind(), ErrorKind::Reentrancy);
        assert_eq!(f.ledger, ledger_before);
        assert!(f.balance(TOKEN0, 666).is_zero());
        assert_eq!(f.totals(), amounts(e18(1_000), e18(1_000)));
    }

    #[test]
    fn test_replayed_mint_callback_is_rejected() {
        let mut f = rogue_fixture(None, true);
        let ledger_before = f.ledger.clone();

        let err = f
            .vault
            .rebalance(&mut f.ledger, addr(OWNER), rebalance_params(-1800, 1800, 0, 600))
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::Reentrancy(CallbackError::NoPendingRequest("mint"))
        );
        assert_eq!(f.ledger, ledger_before);
        assert_eq!(f.vault.get_base_position().unwrap().range, None);
    }
}
