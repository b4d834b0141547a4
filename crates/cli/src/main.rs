//! Command Line Interface for the CLMM vault.
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use clmm_vault_core::gateway::is_proper_ratio;
use clmm_vault_domain::token::TokenAmounts;
use dotenv::dotenv;
use primitive_types::U256;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod scenario;

use scenario::ScenarioConfig;

#[derive(Parser)]
#[command(name = "clmm-vault-cli")]
#[command(about = "Concentrated-liquidity vault simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a multi-holder vault session against a simulated pool
    Simulate {
        /// JSON file with session parameters
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of share holders (overrides the config file)
        #[arg(long)]
        holders: Option<usize>,

        /// RNG seed (overrides the config file)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Price move in ticks before the second rebalance
        #[arg(long, allow_hyphen_values = true)]
        price_move: Option<i32>,
    },
    /// Check whether a deposit passes the gateway ratio guard
    RatioCheck {
        /// Vault token0 holdings (raw units)
        #[arg(long, value_parser = parse_u256)]
        total0: U256,

        /// Vault token1 holdings (raw units)
        #[arg(long, value_parser = parse_u256)]
        total1: U256,

        /// Deposit token0 amount (raw units)
        #[arg(long, value_parser = parse_u256)]
        amount0: U256,

        /// Deposit token1 amount (raw units)
        #[arg(long, value_parser = parse_u256)]
        amount1: U256,

        /// Allowed ratio deviation in basis points
        #[arg(long, default_value_t = 100)]
        tolerance_bps: u32,
    },
}

fn parse_u256(raw: &str) -> Result<U256, String> {
    U256::from_dec_str(raw).map_err(|e| format!("invalid amount {raw}: {e:?}"))
}

fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            holders,
            seed,
            price_move,
        } => {
            let mut config = match config {
                Some(path) => ScenarioConfig::from_file(&path)?,
                None => ScenarioConfig::default(),
            };
            if let Some(holders) = holders {
                config = config.with_holders(holders);
            }
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            if let Some(ticks) = price_move {
                config = config.with_price_move(ticks);
            }

            let report = scenario::run(config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::RatioCheck {
            total0,
            total1,
            amount0,
            amount1,
            tolerance_bps,
        } => {
            let totals = TokenAmounts::new(total0, total1);
            let accepted = is_proper_ratio(totals, amount0, amount1, tolerance_bps)
                .map_err(|e| anyhow!("ratio check failed: {e}"))?;
            println!(
                "{}",
                serde_json::json!({
                    "totals": totals,
                    "deposit": TokenAmounts::new(amount0, amount1),
                    "tolerance_bps": tolerance_bps,
                    "accepted": accepted,
                })
            );
            if !accepted {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
