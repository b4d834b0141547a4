//! In-memory adapters for the pool and token interfaces.
//!
//! These back the scenario tests and the CLI simulator. They keep the pool
//! solvent: every token a position can claim is held by the pool.

/// In-memory token balances.
pub mod ledger;
/// In-memory concentrated-liquidity pool.
pub mod pool;

pub use ledger::InMemoryLedger;
pub use pool::SimulatedPool;
