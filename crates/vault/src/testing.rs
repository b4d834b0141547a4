//! Shared fixtures for the scenario tests.

use crate::config::VaultConfig;
use crate::vault::{RebalanceParams, RebalanceReport, Vault};
use clmm_vault_domain::token::{Address, TokenAmounts};
use clmm_vault_protocols::ledger::TokenLedger;
use clmm_vault_protocols::pool::ConcentratedPool;
use clmm_vault_protocols::simulated::{InMemoryLedger, SimulatedPool};
use clmm_vault_protocols::transactional::Transactional;
use primitive_types::U256;

pub const TOKEN0: u64 = 10;
pub const TOKEN1: u64 = 11;
pub const POOL: u64 = 1_000;
pub const VAULT: u64 = 2_000;
pub const GATEWAY: u64 = 3_000;
pub const OWNER: u64 = 1;
pub const TRADER: u64 = 500;
pub const FEE_RECIPIENT: u64 = 900;
pub const USERS: [u64; 5] = [101, 102, 103, 104, 105];
pub const ALICE: u64 = USERS[0];
pub const BOB: u64 = USERS[1];

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

/// `n` whole tokens of 18 decimals.
pub fn e18(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

pub fn amounts(amount0: U256, amount1: U256) -> TokenAmounts {
    TokenAmounts { amount0, amount1 }
}

pub fn assert_close(actual: U256, expected: U256, tolerance: u64) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= U256::from(tolerance),
        "{actual} differs from {expected} by {diff} (tolerance {tolerance})"
    );
}

pub fn assert_amounts_close(actual: TokenAmounts, expected: TokenAmounts, tolerance: u64) {
    assert_close(actual.amount0, expected.amount0, tolerance);
    assert_close(actual.amount1, expected.amount1, tolerance);
}

/// The standard test pool: spacing 60, 0.3% fee, tick 0.
pub fn pool() -> SimulatedPool {
    SimulatedPool::new(addr(POOL), addr(TOKEN0), addr(TOKEN1))
}

pub fn rebalance_params(
    base_lower: i32,
    base_upper: i32,
    limit_lower: i32,
    limit_upper: i32,
) -> RebalanceParams {
    RebalanceParams {
        base_lower,
        base_upper,
        limit_lower,
        limit_upper,
        fee_recipient: addr(FEE_RECIPIENT),
        swap_quantity: 0,
    }
}

pub struct Fixture<P = SimulatedPool> {
    pub ledger: InMemoryLedger,
    pub vault: Vault<P>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(VaultConfig::default())
    }

    pub fn with_config(config: VaultConfig) -> Self {
        Self::with_pool(pool(), config)
    }

    /// Has the trader pay fees into the pool.
    pub fn accrue_fees(&mut self, fee0: U256, fee1: U256) {
        self.vault
            .pool_mut()
            .accrue_fees(&mut self.ledger, addr(TRADER), amounts(fee0, fee1))
            .unwrap();
    }

    /// Has the trader move the pool price, settling every position.
    pub fn move_to_tick(&mut self, tick: i32) {
        self.vault
            .pool_mut()
            .move_to_tick(&mut self.ledger, addr(TRADER), tick)
            .unwrap();
    }

    pub fn seed_reserves(&mut self, amount0: U256, amount1: U256) {
        self.vault
            .pool_mut()
            .seed_reserves(&mut self.ledger, addr(TRADER), amounts(amount0, amount1))
            .unwrap();
    }
}

impl<P: ConcentratedPool + Transactional> Fixture<P> {
    /// Funds every user and the trader, with users approving the vault.
    pub fn with_pool(pool: P, config: VaultConfig) -> Self {
        let mut ledger = InMemoryLedger::new();
        for token in [addr(TOKEN0), addr(TOKEN1)] {
            for user in USERS {
                ledger.mint(token, addr(user), e18(1_000_000)).unwrap();
                ledger.approve(token, addr(user), addr(VAULT), U256::MAX);
            }
            ledger.mint(token, addr(TRADER), e18(1_000_000_000)).unwrap();
        }
        let vault = Vault::new(addr(VAULT), addr(OWNER), pool, config).unwrap();
        Self { ledger, vault }
    }

    pub fn deposit(&mut self, user: u64, amount0: U256, amount1: U256) -> U256 {
        self.vault
            .deposit(&mut self.ledger, addr(user), amount0, amount1, addr(user))
            .unwrap()
    }

    pub fn withdraw_all(&mut self, user: u64) -> TokenAmounts {
        let shares = self.vault.balance_of(addr(user));
        self.vault
            .withdraw(&mut self.ledger, addr(user), shares, addr(user), addr(user))
            .unwrap()
    }

    pub fn rebalance(
        &mut self,
        base_lower: i32,
        base_upper: i32,
        limit_lower: i32,
        limit_upper: i32,
    ) -> RebalanceReport {
        self.vault
            .rebalance(
                &mut self.ledger,
                addr(OWNER),
                rebalance_params(base_lower, base_upper, limit_lower, limit_upper),
            )
            .unwrap()
    }

    pub fn totals(&self) -> TokenAmounts {
        self.vault.get_total_amounts(&self.ledger).unwrap()
    }

    pub fn balance(&self, token: u64, holder: u64) -> U256 {
        self.ledger.balance_of(addr(token), addr(holder))
    }
}
