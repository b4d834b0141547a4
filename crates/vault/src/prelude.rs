//! Prelude module for convenient imports.
//!
//! ```rust
//! use clmm_vault_core::prelude::*;
//! ```

pub use crate::callback::CallbackGuard;
pub use crate::config::{BPS_DENOMINATOR, GatewayConfig, VaultConfig};
pub use crate::error::{AuthorizationError, ErrorKind, ValidationError, VaultError};
pub use crate::gateway::{DepositGateway, DepositRule, GatewayEntry, is_proper_ratio};
pub use crate::positions::{PositionManager, PositionSnapshot, Slot, Withdrawn};
pub use crate::shares::ShareLedger;
pub use crate::vault::{
    CompoundReport, RebalanceParams, RebalanceReport, Vault, VaultSnapshot, VaultSummary,
};
