//! Prelude module for convenient imports.
//!
//! ```rust
//! use clmm_vault_protocols::prelude::*;
//! ```

pub use crate::ledger::{LedgerError, TokenLedger};
pub use crate::pool::{
    CallbackError, ConcentratedPool, PoolCallback, PoolError, PoolPrice, PositionInfo, SwapResult,
};
pub use crate::simulated::{InMemoryLedger, SimulatedPool};
pub use crate::transactional::{Transactional, atomically};
