//! In-memory concentrated-liquidity pool.
//!
//! Positions, fee growth and settlement follow the on-chain contract; price
//! movement is modelled by [`SimulatedPool::move_to_tick`], where an external
//! trader settles whatever the positions gain or lose, and swaps execute at
//! the spot price against reserves seeded by a liquidity provider.

use crate::ledger::TokenLedger;
use crate::pool::{
    ConcentratedPool, PoolCallback, PoolError, PoolPrice, PositionInfo, SwapResult,
};
use crate::transactional::Transactional;
use clmm_vault_domain::error::{MathError, RangeError};
use clmm_vault_domain::math::full_math::mul_div;
use clmm_vault_domain::math::sqrt_price_math::get_amounts_delta;
use clmm_vault_domain::math::tick_math::get_sqrt_ratio_at_tick;
use clmm_vault_domain::price::{quote_token0_in_token1, quote_token1_in_token0};
use clmm_vault_domain::range::TickRange;
use clmm_vault_domain::token::{Address, TokenAmounts};
use primitive_types::U256;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Default tick spacing (0.3% fee tier).
pub const DEFAULT_TICK_SPACING: i32 = 60;
/// Default swap fee in hundredths of a basis point.
pub const DEFAULT_FEE_PIPS: u32 = 3_000;
/// Denominator of `fee_pips`.
pub const FEE_DENOMINATOR: u32 = 1_000_000;

type PositionKey = (Address, i32, i32);

fn q128() -> U256 {
    U256::one() << 128
}

/// An in-memory pool over two tokens of a [`TokenLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedPool {
    address: Address,
    token0: Address,
    token1: Address,
    tick_spacing: i32,
    fee_pips: u32,
    sqrt_price_x96: U256,
    tick: i32,
    positions: BTreeMap<PositionKey, PositionInfo>,
    /// Cumulative fees per unit of liquidity, per range.
    range_fee_growth: BTreeMap<(i32, i32), (U256, U256)>,
    reserves: TokenAmounts,
}

impl SimulatedPool {
    /// Creates a pool at tick 0 with the default fee tier.
    pub fn new(address: Address, token0: Address, token1: Address) -> Self {
        Self {
            address,
            token0,
            token1,
            tick_spacing: DEFAULT_TICK_SPACING,
            fee_pips: DEFAULT_FEE_PIPS,
            sqrt_price_x96: U256::one() << 96,
            tick: 0,
            positions: BTreeMap::new(),
            range_fee_growth: BTreeMap::new(),
            reserves: TokenAmounts::zero(),
        }
    }

    /// Sets the tick spacing.
    #[must_use]
    pub fn with_tick_spacing(mut self, tick_spacing: i32) -> Self {
        self.tick_spacing = tick_spacing;
        self
    }

    /// Sets the swap fee in hundredths of a basis point.
    #[must_use]
    pub fn with_fee_pips(mut self, fee_pips: u32) -> Self {
        self.fee_pips = fee_pips.min(FEE_DENOMINATOR);
        self
    }

    /// Starts the pool at `tick` instead of 0.
    pub fn at_tick(mut self, tick: i32) -> Result<Self, PoolError> {
        self.sqrt_price_x96 = get_sqrt_ratio_at_tick(tick)?;
        self.tick = tick;
        Ok(self)
    }

    /// Swap fee in hundredths of a basis point.
    pub fn fee_pips(&self) -> u32 {
        self.fee_pips
    }

    /// Tokens available to swaps.
    pub fn reserves(&self) -> TokenAmounts {
        self.reserves
    }

    /// Liquidity of all positions whose range contains the current tick.
    pub fn active_liquidity(&self) -> u128 {
        self.positions
            .iter()
            .filter(|((_, lower, upper), _)| *lower <= self.tick && self.tick < *upper)
            .map(|(_, position)| position.liquidity)
            .fold(0u128, u128::saturating_add)
    }

    /// Adds swap inventory funded by `provider`.
    pub fn seed_reserves(
        &mut self,
        ledger: &mut dyn TokenLedger,
        provider: Address,
        amounts: TokenAmounts,
    ) -> Result<(), PoolError> {
        ledger.transfer(self.token0, provider, self.address, amounts.amount0)?;
        ledger.transfer(self.token1, provider, self.address, amounts.amount1)?;
        self.reserves = self
            .reserves
            .checked_add(amounts)
            .ok_or(MathError::Overflow)?;
        Ok(())
    }

    /// Distributes trading fees paid by `payer` to the in-range positions,
    /// pro rata to their liquidity. With no liquidity in range the fees
    /// join the reserves.
    pub fn accrue_fees(
        &mut self,
        ledger: &mut dyn TokenLedger,
        payer: Address,
        fees: TokenAmounts,
    ) -> Result<(), PoolError> {
        ledger.transfer(self.token0, payer, self.address, fees.amount0)?;
        ledger.transfer(self.token1, payer, self.address, fees.amount1)?;

        let active = self.active_liquidity();
        if active == 0 {
            self.reserves = self.reserves.checked_add(fees).ok_or(MathError::Overflow)?;
            return Ok(());
        }

        let growth0 = mul_div(fees.amount0, q128(), U256::from(active))?;
        let growth1 = mul_div(fees.amount1, q128(), U256::from(active))?;
        let ranges: BTreeSet<(i32, i32)> = self
            .positions
            .iter()
            .filter(|((_, lower, upper), position)| {
                position.liquidity > 0 && *lower <= self.tick && self.tick < *upper
            })
            .map(|((_, lower, upper), _)| (*lower, *upper))
            .collect();
        for range in ranges {
            let growth = self.range_fee_growth.entry(range).or_default();
            growth.0 = growth.0.overflowing_add(growth0).0;
            growth.1 = growth.1.overflowing_add(growth1).0;
        }

        debug!(
            pool = ?self.address,
            fee0 = %fees.amount0,
            fee1 = %fees.amount1,
            active_liquidity = active,
            "Accrued fees"
        );
        Ok(())
    }

    /// Moves the price to `tick`. `trader` pays in what the positions gain
    /// and receives what they lose, keeping the pool solvent.
    pub fn move_to_tick(
        &mut self,
        ledger: &mut dyn TokenLedger,
        trader: Address,
        tick: i32,
    ) -> Result<(), PoolError> {
        let new_sqrt_price = get_sqrt_ratio_at_tick(tick)?;
        let before = self.position_amounts(self.sqrt_price_x96)?;
        let after = self.position_amounts(new_sqrt_price)?;

        for (token, old, new) in [
            (self.token0, before.amount0, after.amount0),
            (self.token1, before.amount1, after.amount1),
        ] {
            if new > old {
                ledger.transfer(token, trader, self.address, new - old)?;
            } else {
                ledger.transfer(token, self.address, trader, old - new)?;
            }
        }

        debug!(pool = ?self.address, from = self.tick, to = tick, "Moved price");
        self.sqrt_price_x96 = new_sqrt_price;
        self.tick = tick;
        Ok(())
    }

    /// Sum of what every position would release if burned at `sqrt_price_x96`.
    fn position_amounts(&self, sqrt_price_x96: U256) -> Result<TokenAmounts, PoolError> {
        let mut total = TokenAmounts::zero();
        for ((_, lower, upper), position) in &self.positions {
            if position.liquidity == 0 {
                continue;
            }
            let amounts = get_amounts_delta(
                sqrt_price_x96,
                get_sqrt_ratio_at_tick(*lower)?,
                get_sqrt_ratio_at_tick(*upper)?,
                position.liquidity,
                false,
            )?;
            total = total
                .checked_add(amounts.into())
                .ok_or(MathError::Overflow)?;
        }
        Ok(total)
    }

    fn check_spacing(&self, range: TickRange) -> Result<(), PoolError> {
        for tick in [range.lower(), range.upper()] {
            if tick % self.tick_spacing != 0 {
                return Err(RangeError::NotAligned {
                    tick,
                    spacing: self.tick_spacing,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Credits fees accrued since the position's last update.
    fn update_position(&mut self, key: PositionKey) -> Result<&mut PositionInfo, PoolError> {
        let growth = self
            .range_fee_growth
            .get(&(key.1, key.2))
            .copied()
            .unwrap_or_default();
        let position = self.positions.entry(key).or_default();
        let liquidity = U256::from(position.liquidity);

        let delta0 = growth.0.overflowing_sub(position.fee_growth_inside0_last_x128).0;
        let delta1 = growth.1.overflowing_sub(position.fee_growth_inside1_last_x128).0;
        let owed0 = mul_div(delta0, liquidity, q128())?;
        let owed1 = mul_div(delta1, liquidity, q128())?;

        position.tokens_owed0 = position
            .tokens_owed0
            .checked_add(owed0)
            .ok_or(MathError::Overflow)?;
        position.tokens_owed1 = position
            .tokens_owed1
            .checked_add(owed1)
            .ok_or(MathError::Overflow)?;
        position.fee_growth_inside0_last_x128 = growth.0;
        position.fee_growth_inside1_last_x128 = growth.1;
        Ok(position)
    }
}

impl ConcentratedPool for SimulatedPool {
    fn address(&self) -> Address {
        self.address
    }

    fn token0(&self) -> Address {
        self.token0
    }

    fn token1(&self) -> Address {
        self.token1
    }

    fn tick_spacing(&self) -> i32 {
        self.tick_spacing
    }

    fn current_price(&self) -> PoolPrice {
        PoolPrice {
            sqrt_price_x96: self.sqrt_price_x96,
            tick: self.tick,
        }
    }

    fn position_info(&self, owner: Address, range: TickRange) -> PositionInfo {
        self.positions
            .get(&(owner, range.lower(), range.upper()))
            .copied()
            .unwrap_or_default()
    }

    fn mint(
        &mut self,
        ledger: &mut dyn TokenLedger,
        owner: Address,
        range: TickRange,
        liquidity: u128,
        callback: &mut dyn PoolCallback,
    ) -> Result<TokenAmounts, PoolError> {
        if liquidity == 0 {
            return Err(PoolError::ZeroLiquidity);
        }
        self.check_spacing(range)?;

        let (sqrt_lower, sqrt_upper) = range.sqrt_ratios()?;
        let owed: TokenAmounts =
            get_amounts_delta(self.sqrt_price_x96, sqrt_lower, sqrt_upper, liquidity, true)?
                .into();

        let balance0 = ledger.balance_of(self.token0, self.address);
        let balance1 = ledger.balance_of(self.token1, self.address);
        callback.on_mint(ledger, self.address, owed)?;
        if ledger.balance_of(self.token0, self.address) < balance0.saturating_add(owed.amount0)
            || ledger.balance_of(self.token1, self.address) < balance1.saturating_add(owed.amount1)
        {
            return Err(PoolError::Underpaid);
        }

        let position = self.update_position((owner, range.lower(), range.upper()))?;
        position.liquidity = position
            .liquidity
            .checked_add(liquidity)
            .ok_or(MathError::Overflow)?;

        debug!(owner = ?owner, range = %range, liquidity, owed = %owed, "Minted");
        Ok(owed)
    }

    fn burn(
        &mut self,
        owner: Address,
        range: TickRange,
        liquidity: u128,
    ) -> Result<TokenAmounts, PoolError> {
        let key = (owner, range.lower(), range.upper());
        let available = self.positions.get(&key).map_or(0, |p| p.liquidity);
        if liquidity > available {
            return Err(PoolError::InsufficientLiquidity {
                available,
                requested: liquidity,
            });
        }
        if available == 0 {
            return Ok(TokenAmounts::zero());
        }

        let (sqrt_lower, sqrt_upper) = range.sqrt_ratios()?;
        let amounts: TokenAmounts =
            get_amounts_delta(self.sqrt_price_x96, sqrt_lower, sqrt_upper, liquidity, false)?
                .into();

        let position = self.update_position(key)?;
        position.liquidity -= liquidity;
        position.tokens_owed0 = position
            .tokens_owed0
            .checked_add(amounts.amount0)
            .ok_or(MathError::Overflow)?;
        position.tokens_owed1 = position
            .tokens_owed1
            .checked_add(amounts.amount1)
            .ok_or(MathError::Overflow)?;

        if liquidity > 0 {
            debug!(owner = ?owner, range = %range, liquidity, amounts = %amounts, "Burned");
        }
        Ok(amounts)
    }

    fn collect(
        &mut self,
        ledger: &mut dyn TokenLedger,
        owner: Address,
        recipient: Address,
        range: TickRange,
        max: TokenAmounts,
    ) -> Result<TokenAmounts, PoolError> {
        let (pool, token0, token1) = (self.address, self.token0, self.token1);
        let Some(position) = self
            .positions
            .get_mut(&(owner, range.lower(), range.upper()))
        else {
            return Ok(TokenAmounts::zero());
        };

        let collected = TokenAmounts {
            amount0: max.amount0.min(position.tokens_owed0),
            amount1: max.amount1.min(position.tokens_owed1),
        };
        position.tokens_owed0 -= collected.amount0;
        position.tokens_owed1 -= collected.amount1;

        ledger.transfer(token0, pool, recipient, collected.amount0)?;
        ledger.transfer(token1, pool, recipient, collected.amount1)?;
        Ok(collected)
    }

    fn swap(
        &mut self,
        ledger: &mut dyn TokenLedger,
        recipient: Address,
        zero_for_one: bool,
        amount_in: U256,
        callback: &mut dyn PoolCallback,
    ) -> Result<SwapResult, PoolError> {
        if amount_in.is_zero() {
            return Err(PoolError::ZeroAmount);
        }

        let (token_in, token_out, gross_out, reserve_out) = if zero_for_one {
            (
                self.token0,
                self.token1,
                quote_token0_in_token1(self.sqrt_price_x96, amount_in)?,
                self.reserves.amount1,
            )
        } else {
            (
                self.token1,
                self.token0,
                quote_token1_in_token0(self.sqrt_price_x96, amount_in)?,
                self.reserves.amount0,
            )
        };
        let amount_out = mul_div(
            gross_out,
            U256::from(FEE_DENOMINATOR - self.fee_pips),
            U256::from(FEE_DENOMINATOR),
        )?;
        if amount_out > reserve_out {
            return Err(PoolError::InsufficientReserves);
        }

        ledger.transfer(token_out, self.address, recipient, amount_out)?;
        let balance_in = ledger.balance_of(token_in, self.address);
        callback.on_swap(ledger, self.address, token_in, amount_in)?;
        if ledger.balance_of(token_in, self.address) < balance_in.saturating_add(amount_in) {
            return Err(PoolError::Underpaid);
        }

        if zero_for_one {
            self.reserves.amount0 += amount_in;
            self.reserves.amount1 -= amount_out;
        } else {
            self.reserves.amount1 += amount_in;
            self.reserves.amount0 -= amount_out;
        }

        debug!(
            zero_for_one,
            amount_in = %amount_in,
            amount_out = %amount_out,
            "Swapped"
        );
        Ok(SwapResult {
            amount_in,
            amount_out,
        })
    }
}

impl Transactional for SimulatedPool {
    type Snapshot = Self;

    fn snapshot(&self) -> Self {
        self.clone()
    }

    fn restore(&mut self, snapshot: Self) {
        *self = snapshot;
    }
}
