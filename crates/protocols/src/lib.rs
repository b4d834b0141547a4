//! Interfaces the vault consumes from the outside world, and in-memory
//! implementations of them.
//!
//! - [`pool::ConcentratedPool`]: mint, burn, collect and swap against a
//!   concentrated-liquidity pool, with repayment callbacks
//! - [`ledger::TokenLedger`]: ERC20-style balances and allowances
//! - [`transactional::Transactional`]: snapshot and rollback of state

/// Prelude module for convenient imports.
pub mod prelude;

/// Token balance interface.
pub mod ledger;
/// Pool position interface.
pub mod pool;
/// In-memory adapters.
pub mod simulated;
/// Checkpoint and rollback.
pub mod transactional;
