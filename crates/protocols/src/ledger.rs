//! Token balance interface consumed by the vault.

use clmm_vault_domain::token::Address;
use primitive_types::U256;
use thiserror::Error;

/// Failures of a token movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Sender holds fewer tokens than requested.
    #[error("insufficient balance of {token:?}: have {available}, need {required}")]
    InsufficientBalance {
        /// Token being moved.
        token: Address,
        /// Balance held.
        available: U256,
        /// Amount requested.
        required: U256,
    },
    /// Spender was not authorised for the requested amount.
    #[error("insufficient allowance on {token:?}: have {available}, need {required}")]
    InsufficientAllowance {
        /// Token being moved.
        token: Address,
        /// Allowance granted.
        available: U256,
        /// Amount requested.
        required: U256,
    },
    /// Recipient balance would overflow.
    #[error("balance overflow")]
    Overflow,
}

/// ERC20-style balances for any number of tokens.
///
/// `transfer_from` consumes an allowance previously granted with `approve`;
/// an allowance of `U256::MAX` is never decremented.
pub trait TokenLedger {
    /// Balance of `holder` in `token`.
    fn balance_of(&self, token: Address, holder: Address) -> U256;

    /// Amount `spender` may still pull from `owner`.
    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256;

    /// Sets the allowance of `spender` over `owner`'s tokens.
    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256);

    /// Moves `amount` from `from` to `to`.
    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`.
    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError>;
}
