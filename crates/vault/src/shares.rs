//! Fungible vault shares.

use crate::error::{AuthorizationError, ValidationError, VaultError};
use clmm_vault_domain::error::MathError;
use clmm_vault_domain::token::Address;
use primitive_types::U256;
use std::collections::BTreeMap;

/// Share balances, allowances and total supply.
///
/// The sum of all balances equals `total_supply` after every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareLedger {
    total_supply: U256,
    balances: BTreeMap<Address, U256>,
    allowances: BTreeMap<(Address, Address), U256>,
}

impl ShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.balances.get(&holder).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn mint(&mut self, to: Address, amount: U256) -> Result<(), VaultError> {
        if to.is_zero() {
            return Err(ValidationError::ZeroAddress("share recipient").into());
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        let balance = self.balance_of(to) + amount;
        self.total_supply = supply;
        self.set_balance(to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: Address, amount: U256) -> Result<(), VaultError> {
        let balance = self.debit_amount(from, amount)?;
        self.set_balance(from, balance);
        self.total_supply -= amount;
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), VaultError> {
        if to.is_zero() {
            return Err(ValidationError::ZeroAddress("share recipient").into());
        }
        let remaining = self.debit_amount(from, amount)?;
        self.set_balance(from, remaining);
        let credited = self.balance_of(to) + amount;
        self.set_balance(to, credited);
        Ok(())
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    /// Consumes `amount` of `spender`'s allowance over `owner`'s shares.
    /// An allowance of `U256::MAX` is unlimited.
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), VaultError> {
        let available = self.allowance(owner, spender);
        if available == U256::MAX {
            return Ok(());
        }
        if available < amount {
            return Err(AuthorizationError::InsufficientShareAllowance {
                available,
                required: amount,
            }
            .into());
        }
        self.approve(owner, spender, available - amount);
        Ok(())
    }

    fn debit_amount(&self, from: Address, amount: U256) -> Result<U256, VaultError> {
        let available = self.balance_of(from);
        available.checked_sub(amount).ok_or_else(|| {
            ValidationError::InsufficientShares {
                available,
                required: amount,
            }
            .into()
        })
    }

    fn set_balance(&mut self, holder: Address, balance: U256) {
        if balance.is_zero() {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, balance);
        }
    }
}
