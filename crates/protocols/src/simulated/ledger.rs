//! In-memory token balances.

use crate::ledger::{LedgerError, TokenLedger};
use crate::transactional::Transactional;
use clmm_vault_domain::token::Address;
use primitive_types::U256;
use std::collections::HashMap;

/// Balances and allowances for any number of tokens, held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryLedger {
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `amount` of `token` out of thin air for `to`.
    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        let balance = self.balances.entry((token, to)).or_default();
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    fn debit(&mut self, token: Address, from: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token,
                available,
                required: amount,
            });
        }
        self.balances.insert((token, from), available - amount);
        Ok(())
    }
}

impl TokenLedger for InMemoryLedger {
    fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((token, owner, spender), amount);
    }

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.debit(token, from, amount)?;
        self.balances.insert((token, to), credited);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if spender != from {
            let available = self.allowance(token, from, spender);
            if available < amount {
                return Err(LedgerError::InsufficientAllowance {
                    token,
                    available,
                    required: amount,
                });
            }
            if available != U256::MAX {
                self.allowances
                    .insert((token, from, spender), available - amount);
            }
        }
        self.transfer(token, from, to, amount)
    }
}

impl Transactional for InMemoryLedger {
    type Snapshot = Self;

    fn snapshot(&self) -> Self {
        self.clone()
    }

    fn restore(&mut self, snapshot: Self) {
        *self = snapshot;
    }
}
