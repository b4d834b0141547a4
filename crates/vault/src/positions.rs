//! Base and limit positions of a vault.

use crate::callback::CallbackGuard;
use crate::error::VaultError;
use clmm_vault_domain::error::MathError;
use clmm_vault_domain::math::full_math::mul_div;
use clmm_vault_domain::math::liquidity_amounts::{
    get_amounts_for_liquidity, get_liquidity_for_amounts,
};
use clmm_vault_domain::range::TickRange;
use clmm_vault_domain::token::{Address, TokenAmounts};
use clmm_vault_protocols::ledger::TokenLedger;
use clmm_vault_protocols::pool::{ConcentratedPool, SwapResult};
use clmm_vault_protocols::transactional::Transactional;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Which of the two managed ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Wide primary range.
    Base,
    /// Narrow single-sided range for surplus.
    Limit,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Limit => write!(f, "limit"),
        }
    }
}

/// Externally observable state of one managed position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Active range, `None` before the first rebalance.
    pub range: Option<TickRange>,
    /// Deployed liquidity.
    pub liquidity: u128,
    /// Token0 redeemable at the current price, including tokens owed.
    pub amount0: U256,
    /// Token1 redeemable at the current price, including tokens owed.
    pub amount1: U256,
}

impl PositionSnapshot {
    pub fn amounts(&self) -> TokenAmounts {
        TokenAmounts {
            amount0: self.amount0,
            amount1: self.amount1,
        }
    }
}

/// Outcome of fully withdrawing a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    /// Everything collected: principal plus fees.
    pub collected: TokenAmounts,
    /// Fee component, measured before the burn.
    pub fees: TokenAmounts,
    /// Liquidity removed.
    pub liquidity: u128,
}

/// Manages the vault's two positions in one pool.
///
/// Principal released by a burn is always collected in the same step, so
/// tokens owed to a position consist of accrued fees only.
#[derive(Debug, Clone)]
pub struct PositionManager<P> {
    pool: P,
    owner: Address,
    base: Option<TickRange>,
    limit: Option<TickRange>,
}

/// Captured state of a [`PositionManager`].
#[derive(Debug, Clone)]
pub struct PositionManagerSnapshot<S> {
    pool: S,
    base: Option<TickRange>,
    limit: Option<TickRange>,
}

impl<P: ConcentratedPool> PositionManager<P> {
    /// Manages positions owned by `owner` in `pool`; both slots start empty.
    pub fn new(pool: P, owner: Address) -> Self {
        Self {
            pool,
            owner,
            base: None,
            limit: None,
        }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut P {
        &mut self.pool
    }

    /// Active range of `slot`.
    pub fn range(&self, slot: Slot) -> Option<TickRange> {
        match slot {
            Slot::Base => self.base,
            Slot::Limit => self.limit,
        }
    }

    fn set_range(&mut self, slot: Slot, range: TickRange) {
        match slot {
            Slot::Base => self.base = Some(range),
            Slot::Limit => self.limit = Some(range),
        }
    }

    /// Liquidity currently deployed in `slot`.
    pub fn liquidity(&self, slot: Slot) -> u128 {
        self.range(slot)
            .map_or(0, |range| self.pool.position_info(self.owner, range).liquidity)
    }

    /// Tokens held by the owner outside the pool.
    pub fn idle(&self, ledger: &dyn TokenLedger) -> TokenAmounts {
        TokenAmounts {
            amount0: ledger.balance_of(self.pool.token0(), self.owner),
            amount1: ledger.balance_of(self.pool.token1(), self.owner),
        }
    }

    /// What a full withdrawal of `slot` would yield at the current price.
    pub fn position(&self, slot: Slot) -> Result<PositionSnapshot, MathError> {
        let Some(range) = self.range(slot) else {
            return Ok(PositionSnapshot::default());
        };
        let info = self.pool.position_info(self.owner, range);
        let (sqrt_lower, sqrt_upper) = range.sqrt_ratios()?;
        let (amount0, amount1) = get_amounts_for_liquidity(
            self.pool.current_price().sqrt_price_x96,
            sqrt_lower,
            sqrt_upper,
            info.liquidity,
        )?;
        Ok(PositionSnapshot {
            range: Some(range),
            liquidity: info.liquidity,
            amount0: amount0
                .checked_add(info.tokens_owed0)
                .ok_or(MathError::Overflow)?,
            amount1: amount1
                .checked_add(info.tokens_owed1)
                .ok_or(MathError::Overflow)?,
        })
    }

    /// Idle balance plus both positions.
    pub fn total_amounts(&self, ledger: &dyn TokenLedger) -> Result<TokenAmounts, MathError> {
        let base = self.position(Slot::Base)?.amounts();
        let limit = self.position(Slot::Limit)?.amounts();
        self.idle(ledger)
            .checked_add(base)
            .and_then(|sum| sum.checked_add(limit))
            .ok_or(MathError::Overflow)
    }

    /// Credits fees accrued by both positions to their tokens owed.
    pub fn poke(&mut self) -> Result<(), VaultError> {
        for slot in [Slot::Base, Slot::Limit] {
            if let Some(range) = self.range(slot) {
                if self.liquidity(slot) > 0 {
                    self.pool.burn(self.owner, range, 0)?;
                }
            }
        }
        Ok(())
    }

    /// Uncollected fees of both positions. Pokes first.
    pub fn pending_fees(&mut self) -> Result<TokenAmounts, VaultError> {
        self.poke()?;
        let mut fees = TokenAmounts::zero();
        for slot in [Slot::Base, Slot::Limit] {
            if let Some(range) = self.range(slot) {
                let owed = self.pool.position_info(self.owner, range).tokens_owed();
                fees = fees.checked_add(owed).ok_or(MathError::Overflow)?;
            }
        }
        Ok(fees)
    }

    /// Burns `shares / total_supply` of the liquidity in `slot` and sends
    /// the released principal, plus the same fraction of owed fees, to
    /// `recipient`. Expects the position to have been poked.
    pub fn withdraw_fraction(
        &mut self,
        ledger: &mut dyn TokenLedger,
        slot: Slot,
        shares: U256,
        total_supply: U256,
        recipient: Address,
    ) -> Result<TokenAmounts, VaultError> {
        let Some(range) = self.range(slot) else {
            return Ok(TokenAmounts::zero());
        };
        let info = self.pool.position_info(self.owner, range);

        let liquidity = mul_div(U256::from(info.liquidity), shares, total_supply)?.low_u128();
        let released = if liquidity > 0 {
            self.pool.burn(self.owner, range, liquidity)?
        } else {
            TokenAmounts::zero()
        };
        let fee_share = TokenAmounts {
            amount0: mul_div(info.tokens_owed0, shares, total_supply)?,
            amount1: mul_div(info.tokens_owed1, shares, total_supply)?,
        };
        let requested = released
            .checked_add(fee_share)
            .ok_or(MathError::Overflow)?;

        let collected = self
            .pool
            .collect(ledger, self.owner, recipient, range, requested)?;
        debug!(slot = %slot, liquidity, collected = %collected, "Withdrew position slice");
        Ok(collected)
    }

    /// Burns all liquidity in `slot` and collects principal and fees into
    /// idle. The range stays recorded.
    pub fn withdraw_all(
        &mut self,
        ledger: &mut dyn TokenLedger,
        slot: Slot,
    ) -> Result<Withdrawn, VaultError> {
        let Some(range) = self.range(slot) else {
            return Ok(Withdrawn::default());
        };
        let liquidity = self.liquidity(slot);
        if liquidity > 0 {
            self.pool.burn(self.owner, range, 0)?;
        }
        let fees = self.pool.position_info(self.owner, range).tokens_owed();
        if liquidity > 0 {
            self.pool.burn(self.owner, range, liquidity)?;
        }
        let collected = self.pool.collect(
            ledger,
            self.owner,
            self.owner,
            range,
            TokenAmounts::new(U256::MAX, U256::MAX),
        )?;
        debug!(slot = %slot, liquidity, collected = %collected, fees = %fees, "Withdrew position");
        Ok(Withdrawn {
            collected,
            fees,
            liquidity,
        })
    }

    /// Collects the fees owed to `slot` into idle without touching liquidity.
    pub fn collect_fees(
        &mut self,
        ledger: &mut dyn TokenLedger,
        slot: Slot,
    ) -> Result<TokenAmounts, VaultError> {
        let Some(range) = self.range(slot) else {
            return Ok(TokenAmounts::zero());
        };
        if self.liquidity(slot) > 0 {
            self.pool.burn(self.owner, range, 0)?;
        }
        let collected = self.pool.collect(
            ledger,
            self.owner,
            self.owner,
            range,
            TokenAmounts::new(U256::MAX, U256::MAX),
        )?;
        Ok(collected)
    }

    /// Mints as much liquidity over `range` as `amounts` fund at the current
    /// price and records `range` as the active range of `slot`, even when
    /// nothing could be minted. Returns the liquidity and amounts paid.
    pub fn deploy(
        &mut self,
        ledger: &mut dyn TokenLedger,
        slot: Slot,
        range: TickRange,
        amounts: TokenAmounts,
    ) -> Result<(u128, TokenAmounts), VaultError> {
        self.set_range(slot, range);
        let (sqrt_lower, sqrt_upper) = range.sqrt_ratios()?;
        let liquidity = get_liquidity_for_amounts(
            self.pool.current_price().sqrt_price_x96,
            sqrt_lower,
            sqrt_upper,
            amounts.amount0,
            amounts.amount1,
        )?;
        if liquidity == 0 {
            return Ok((0, TokenAmounts::zero()));
        }

        let mut guard = CallbackGuard::for_mint(
            self.pool.address(),
            self.owner,
            self.pool.token0(),
            self.pool.token1(),
        );
        let paid = self
            .pool
            .mint(ledger, self.owner, range, liquidity, &mut guard)?;
        debug!(slot = %slot, range = %range, liquidity, paid = %paid, "Deployed liquidity");
        Ok((liquidity, paid))
    }

    /// Sells `amount_in` of token0 (`zero_for_one`) or token1 from idle.
    pub fn swap(
        &mut self,
        ledger: &mut dyn TokenLedger,
        zero_for_one: bool,
        amount_in: U256,
    ) -> Result<SwapResult, VaultError> {
        let mut guard = CallbackGuard::for_swap(
            self.pool.address(),
            self.owner,
            self.pool.token0(),
            self.pool.token1(),
        );
        let result = self
            .pool
            .swap(ledger, self.owner, zero_for_one, amount_in, &mut guard)?;
        Ok(result)
    }
}

impl<P: ConcentratedPool + Transactional> Transactional for PositionManager<P> {
    type Snapshot = PositionManagerSnapshot<P::Snapshot>;

    fn snapshot(&self) -> Self::Snapshot {
        PositionManagerSnapshot {
            pool: self.pool.snapshot(),
            base: self.base,
            limit: self.limit,
        }
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        self.pool.restore(snapshot.pool);
        self.base = snapshot.base;
        self.limit = snapshot.limit;
    }
}
