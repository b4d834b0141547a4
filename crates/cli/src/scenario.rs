//! Scripted multi-holder vault session against the simulated pool.

use anyhow::{Context, Result, bail};
use clmm_vault_core::prelude::*;
use clmm_vault_domain::prelude::*;
use clmm_vault_protocols::prelude::*;
use primitive_types::U256;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const POOL: u64 = 1_000;
const VAULT: u64 = 2_000;
const GATEWAY: u64 = 3_000;
const OWNER: u64 = 1;
const TRADER: u64 = 500;
const FEE_RECIPIENT: u64 = 900;
const FIRST_HOLDER: u64 = 101;

fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

/// Largest token decimals a session accepts.
const MAX_DECIMALS: u8 = 30;

/// Whole tokens in raw units.
fn whole(tokens: u64, decimals: u8) -> U256 {
    U256::from(tokens) * U256::exp10(decimals as usize)
}

/// Session parameters, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Number of share holders.
    pub holders: usize,
    /// RNG seed for deposit and fee sizes.
    pub seed: u64,
    /// Smallest deposit, in whole token0.
    pub min_deposit: u64,
    /// Largest deposit, in whole token0.
    pub max_deposit: u64,
    /// Half-width of the base range, in ticks.
    pub base_half_width: i32,
    /// Width of the limit range, in ticks.
    pub limit_width: i32,
    /// Price move before the second rebalance, in ticks.
    pub price_move: i32,
    /// Largest fee payment per round, in whole tokens.
    pub max_fee: u64,
    pub token0: Token,
    pub token1: Token,
    pub vault: VaultConfig,
    pub gateway: GatewayConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            holders: 5,
            seed: 42,
            min_deposit: 1_000,
            max_deposit: 10_000,
            base_half_width: 1_800,
            limit_width: 600,
            price_move: 600,
            max_fee: 50,
            token0: Token::new(addr(10), "WETH", 18, "Wrapped Ether"),
            token1: Token::new(addr(11), "DAI", 18, "Dai Stablecoin"),
            vault: VaultConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// Reads a JSON config; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    #[must_use]
    pub fn with_holders(mut self, holders: usize) -> Self {
        self.holders = holders;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_price_move(mut self, ticks: i32) -> Self {
        self.price_move = ticks;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.holders == 0 {
            bail!("at least one holder is required");
        }
        if self.min_deposit == 0 || self.min_deposit > self.max_deposit {
            bail!(
                "invalid deposit bounds [{}, {}]",
                self.min_deposit,
                self.max_deposit
            );
        }
        if self.base_half_width <= 0 || self.limit_width <= 0 {
            bail!("range widths must be positive");
        }
        for token in [&self.token0, &self.token1] {
            if token.decimals > MAX_DECIMALS {
                bail!(
                    "{} has {} decimals, at most {MAX_DECIMALS} are supported",
                    token.symbol,
                    token.decimals
                );
            }
        }
        Ok(())
    }
}

/// What one holder put in and took out.
#[derive(Debug, Clone, Serialize)]
pub struct HolderOutcome {
    pub holder: Address,
    pub shares: U256,
    pub deposited: TokenAmounts,
    pub withdrawn: TokenAmounts,
    /// `withdrawn / deposited` valued in token1 at the final price.
    pub return_ratio: Decimal,
}

/// Result of a session.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub seed: u64,
    pub token0: String,
    pub token1: String,
    pub rebalances: Vec<RebalanceReport>,
    pub compounds: Vec<CompoundReport>,
    /// Vault state just before the holders exit.
    pub before_exit: VaultSummary,
    /// Token1 per token0, adjusted for decimals.
    pub final_price: Decimal,
    pub protocol_fees: TokenAmounts,
    pub holders: Vec<HolderOutcome>,
}

/// Aligns `tick` down to a multiple of `spacing`.
fn align(tick: i32, spacing: i32) -> i32 {
    tick - tick.rem_euclid(spacing)
}

struct Session {
    config: ScenarioConfig,
    rng: StdRng,
    ledger: InMemoryLedger,
    vault: Vault<SimulatedPool>,
    gateway: DepositGateway,
}

impl Session {
    fn new(config: ScenarioConfig) -> Result<Self> {
        config.validate()?;
        let (token0, token1) = (config.token0.address, config.token1.address);
        let mut ledger = InMemoryLedger::new();

        for token in [&config.token0, &config.token1] {
            ledger.mint(token.address, addr(TRADER), whole(1_000_000_000, token.decimals))?;
        }
        let holders = (0..config.holders as u64).map(|i| addr(FIRST_HOLDER + i));
        for holder in holders {
            for token in [&config.token0, &config.token1] {
                ledger.mint(token.address, holder, whole(1_000_000, token.decimals))?;
                ledger.approve(token.address, holder, addr(GATEWAY), U256::MAX);
            }
        }

        let mut pool = SimulatedPool::new(addr(POOL), token0, token1);
        pool.seed_reserves(
            &mut ledger,
            addr(TRADER),
            TokenAmounts::new(
                whole(100_000, config.token0.decimals),
                whole(100_000, config.token1.decimals),
            ),
        )?;

        let vault = Vault::new(addr(VAULT), addr(OWNER), pool, config.vault.clone())?;
        let mut gateway = DepositGateway::new(addr(GATEWAY), addr(OWNER), config.gateway.clone())?;
        gateway.register_vault(addr(OWNER), addr(VAULT), DepositRule::Relayed)?;

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            ledger,
            vault,
            gateway,
        })
    }

    fn holders(&self) -> Vec<Address> {
        (0..self.config.holders as u64)
            .map(|i| addr(FIRST_HOLDER + i))
            .collect()
    }

    /// A deposit matching the vault's current ratio, so the gateway accepts it.
    fn deposit(&mut self, holder: Address) -> Result<(U256, TokenAmounts)> {
        let size = self
            .rng
            .random_range(self.config.min_deposit..=self.config.max_deposit);
        let amount0 = whole(size, self.config.token0.decimals);
        let totals = self.vault.get_total_amounts(&self.ledger)?;
        let amount1 = if totals.is_zero() {
            whole(size, self.config.token1.decimals)
        } else if totals.amount0.is_zero() {
            bail!("vault holds no token0; a ratio-matched deposit is impossible");
        } else {
            mul_div(amount0, totals.amount1, totals.amount0)?
        };

        let shares = self.gateway.deposit(
            &mut self.ledger,
            &mut self.vault,
            holder,
            amount0,
            amount1,
            holder,
        )?;
        Ok((shares, TokenAmounts::new(amount0, amount1)))
    }

    fn rebalance_around(&mut self, tick: i32) -> Result<RebalanceReport> {
        let spacing = self.vault.pool().tick_spacing();
        let center = align(tick, spacing);
        let half = align(self.config.base_half_width, spacing).max(spacing);
        let width = align(self.config.limit_width, spacing).max(spacing);
        let params = RebalanceParams {
            base_lower: center - half,
            base_upper: center + half,
            limit_lower: center,
            limit_upper: center + width,
            fee_recipient: addr(FEE_RECIPIENT),
            swap_quantity: 0,
        };
        Ok(self.vault.rebalance(&mut self.ledger, addr(OWNER), params)?)
    }

    fn generate_fees(&mut self) -> Result<TokenAmounts> {
        let fee0 = self.rng.random_range(1..=self.config.max_fee.max(1));
        let fee1 = self.rng.random_range(1..=self.config.max_fee.max(1));
        let fees = TokenAmounts::new(
            whole(fee0, self.config.token0.decimals),
            whole(fee1, self.config.token1.decimals),
        );
        self.vault
            .pool_mut()
            .accrue_fees(&mut self.ledger, addr(TRADER), fees)?;
        info!(fee0, fee1, "Generated trading fees");
        Ok(fees)
    }

    fn run(mut self) -> Result<ScenarioReport> {
        let holders = self.holders();
        let mut deposits = Vec::with_capacity(holders.len());
        let mut rebalances = Vec::new();
        let mut compounds = Vec::new();

        // the first holder opens the vault, the rest join after the first rebalance
        deposits.push(self.deposit(holders[0])?);
        rebalances.push(self.rebalance_around(self.vault.current_tick())?);
        for holder in &holders[1..] {
            deposits.push(self.deposit(*holder)?);
        }

        self.generate_fees()?;
        compounds.push(self.vault.compound(&mut self.ledger, addr(OWNER))?);
        self.generate_fees()?;

        let target = align(
            self.vault.current_tick() + self.config.price_move,
            self.vault.pool().tick_spacing(),
        );
        self.vault
            .pool_mut()
            .move_to_tick(&mut self.ledger, addr(TRADER), target)?;
        info!(tick = target, "Moved pool price");
        rebalances.push(self.rebalance_around(target)?);

        let before_exit = self.vault.summary(&self.ledger)?;
        let sqrt_price = self.vault.pool().current_price().sqrt_price_x96;

        let mut outcomes = Vec::with_capacity(holders.len());
        for (holder, (shares, deposited)) in holders.iter().zip(deposits) {
            let balance = self.vault.balance_of(*holder);
            let withdrawn = self
                .vault
                .withdraw(&mut self.ledger, *holder, balance, *holder, *holder)?;
            let value_in = value_in_token1(sqrt_price, deposited)?;
            let value_out = value_in_token1(sqrt_price, withdrawn)?;
            outcomes.push(HolderOutcome {
                holder: *holder,
                shares,
                deposited,
                withdrawn,
                return_ratio: ratio(value_out, value_in),
            });
        }

        let protocol_fees = TokenAmounts::new(
            self.ledger
                .balance_of(self.config.token0.address, addr(FEE_RECIPIENT)),
            self.ledger
                .balance_of(self.config.token1.address, addr(FEE_RECIPIENT)),
        );
        let final_price = Price::from_sqrt_price_x96(sqrt_price)?
            .adjusted(self.config.token0.decimals, self.config.token1.decimals)?
            .value;

        Ok(ScenarioReport {
            seed: self.config.seed,
            token0: self.config.token0.symbol.clone(),
            token1: self.config.token1.symbol.clone(),
            rebalances,
            compounds,
            before_exit,
            final_price,
            protocol_fees,
            holders: outcomes,
        })
    }
}

/// `numerator / denominator` as a decimal, or zero when either side does
/// not fit.
fn ratio(numerator: U256, denominator: U256) -> Decimal {
    let to_decimal = |value: U256| {
        to_u128(value)
            .ok()
            .and_then(|value| i128::try_from(value).ok())
            .and_then(|value| Decimal::try_from_i128_with_scale(value, 0).ok())
    };
    match (to_decimal(numerator), to_decimal(denominator)) {
        (Some(n), Some(d)) if !d.is_zero() => n.checked_div(d).map_or(Decimal::ZERO, |r| r.round_dp(8)),
        _ => Decimal::ZERO,
    }
}

/// Runs a full session and reports it.
pub fn run(config: ScenarioConfig) -> Result<ScenarioReport> {
    info!(
        holders = config.holders,
        seed = config.seed,
        price_move = config.price_move,
        "Starting vault simulation"
    );
    Session::new(config)?.run()
}
