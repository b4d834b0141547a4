//! Vault accounting for concentrated-liquidity positions.
//!
//! This crate provides:
//! - Share issuance and redemption against a base and a limit position
//! - Owner-driven rebalancing with an optional internal trade
//! - Fee compounding and a protocol fee skim
//! - A deposit gateway enforcing the vault's token ratio
//! - Pool callback authentication

/// Prelude module for convenient imports.
pub mod prelude;

/// Pool callback authentication.
pub mod callback;
/// Vault and gateway configuration.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Ratio-checked deposit gateway.
pub mod gateway;
/// Base and limit position management.
pub mod positions;
/// Share balances and allowances.
pub mod shares;
/// The vault itself.
pub mod vault;

#[cfg(test)]
mod testing;
