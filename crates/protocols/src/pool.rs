//! Position interface of a concentrated-liquidity pool.
//!
//! Mint and swap settle through a callback: the pool computes what it is
//! owed, hands control to the caller's [`PoolCallback`], and verifies its own
//! balances afterwards.

use crate::ledger::{LedgerError, TokenLedger};
use clmm_vault_domain::error::{MathError, RangeError};
use clmm_vault_domain::range::TickRange;
use clmm_vault_domain::token::{Address, TokenAmounts};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised inside a mint or swap callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// The callback was invoked by a contract other than the expected pool.
    #[error("callback from unexpected caller {actual:?}, expected {expected:?}")]
    UnexpectedCaller {
        /// Pool the handler was armed for.
        expected: Address,
        /// Address that invoked the callback.
        actual: Address,
    },
    /// The handler had no outstanding request of that kind.
    #[error("no pending {0} request")]
    NoPendingRequest(&'static str),
    /// Repayment failed.
    #[error("callback repayment failed: {0}")]
    Payment(#[from] LedgerError),
}

/// Errors returned by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("math error: {0}")]
    Math(#[from] MathError),
    #[error("invalid range: {0}")]
    Range(#[from] RangeError),
    #[error("liquidity must be positive")]
    ZeroLiquidity,
    #[error("position holds {available} liquidity, {requested} requested")]
    InsufficientLiquidity {
        /// Liquidity in the position.
        available: u128,
        /// Liquidity requested.
        requested: u128,
    },
    #[error("amount must be positive")]
    ZeroAmount,
    #[error("pool reserves cannot cover the output")]
    InsufficientReserves,
    #[error("callback underpaid the pool")]
    Underpaid,
    #[error("callback failed: {0}")]
    Callback(#[from] CallbackError),
    #[error("token transfer failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Current pool price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPrice {
    /// Q64.96 sqrt price.
    pub sqrt_price_x96: U256,
    /// Tick the price lies in.
    pub tick: i32,
}

/// State of one owner's position over one range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    /// Deployed liquidity.
    pub liquidity: u128,
    /// Fee growth per unit of liquidity at the last update, token0.
    pub fee_growth_inside0_last_x128: U256,
    /// Fee growth per unit of liquidity at the last update, token1.
    pub fee_growth_inside1_last_x128: U256,
    /// Uncollected token0 (burned principal and credited fees).
    pub tokens_owed0: U256,
    /// Uncollected token1 (burned principal and credited fees).
    pub tokens_owed1: U256,
}

impl PositionInfo {
    /// Tokens owed as a pair.
    #[must_use]
    pub fn tokens_owed(&self) -> TokenAmounts {
        TokenAmounts {
            amount0: self.tokens_owed0,
            amount1: self.tokens_owed1,
        }
    }
}

/// Amounts exchanged by a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    /// Amount paid into the pool.
    pub amount_in: U256,
    /// Amount sent to the recipient.
    pub amount_out: U256,
}

/// Repayment hook invoked by the pool during mint and swap.
///
/// `caller` is the address of the pool invoking the hook.
pub trait PoolCallback {
    /// Pays `owed` for freshly minted liquidity.
    fn on_mint(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        owed: TokenAmounts,
    ) -> Result<(), CallbackError>;

    /// Pays `amount_in` of `token_in` for a swap.
    fn on_swap(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        token_in: Address,
        amount_in: U256,
    ) -> Result<(), CallbackError>;
}

/// Operations a vault performs against a concentrated-liquidity pool.
///
/// Positions are keyed by `(owner, range)`.
pub trait ConcentratedPool {
    /// Address of the pool; callbacks report it as their caller.
    fn address(&self) -> Address;

    fn token0(&self) -> Address;

    fn token1(&self) -> Address;

    /// Ranges must be multiples of this.
    fn tick_spacing(&self) -> i32;

    fn current_price(&self) -> PoolPrice;

    /// Position state; an unknown position reads as empty.
    fn position_info(&self, owner: Address, range: TickRange) -> PositionInfo;

    /// Adds `liquidity` to `owner`'s position and collects payment through
    /// `callback`. Returns the amounts paid.
    fn mint(
        &mut self,
        ledger: &mut dyn TokenLedger,
        owner: Address,
        range: TickRange,
        liquidity: u128,
        callback: &mut dyn PoolCallback,
    ) -> Result<TokenAmounts, PoolError>;

    /// Removes `liquidity` and credits the released amounts to tokens owed.
    /// Burning zero only credits accrued fees.
    fn burn(
        &mut self,
        owner: Address,
        range: TickRange,
        liquidity: u128,
    ) -> Result<TokenAmounts, PoolError>;

    /// Sends up to `max` of the tokens owed to `recipient`.
    fn collect(
        &mut self,
        ledger: &mut dyn TokenLedger,
        owner: Address,
        recipient: Address,
        range: TickRange,
        max: TokenAmounts,
    ) -> Result<TokenAmounts, PoolError>;

    /// Sells `amount_in` of token0 (`zero_for_one`) or token1, paying the
    /// output to `recipient` before collecting input through `callback`.
    fn swap(
        &mut self,
        ledger: &mut dyn TokenLedger,
        recipient: Address,
        zero_for_one: bool,
        amount_in: U256,
        callback: &mut dyn PoolCallback,
    ) -> Result<SwapResult, PoolError>;
}
