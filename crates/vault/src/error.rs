//! Error taxonomy of the vault and the deposit gateway.
//!
//! Every error aborts the operation that raised it; state is rolled back to
//! what it was before the call.

use crate::positions::Slot;
use clmm_vault_domain::error::{MathError, RangeError};
use clmm_vault_domain::token::Address;
use clmm_vault_protocols::ledger::LedgerError;
use clmm_vault_protocols::pool::{CallbackError, PoolError};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad category of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Invalid input or state.
    Validation,
    /// Caller lacks the required role or allowance.
    Authorization,
    /// A pool callback came from the wrong place or at the wrong time.
    Reentrancy,
    /// Fixed-point overflow, underflow or division by zero.
    Arithmetic,
}

/// Invalid input or a state that forbids the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("deposit amounts are both zero")]
    ZeroDeposit,
    /// Deposit would push holdings of `token` (0 or 1) over its ceiling.
    #[error("deposit ceiling of token{token} exceeded: {requested} > {max}")]
    DepositCeilingExceeded {
        /// Token index.
        token: u8,
        /// Holdings or amount after the deposit.
        requested: U256,
        /// Configured ceiling.
        max: U256,
    },
    #[error("max total supply {max} exceeded")]
    MaxTotalSupplyExceeded {
        /// Configured share cap.
        max: U256,
    },
    #[error("deposit too small to mint a share")]
    ZeroShares,
    #[error("deposit ratio deviates from the vault ratio")]
    ImproperRatio,
    #[error("vault {0:?} is not registered")]
    UnregisteredVault(Address),
    #[error("vault {0:?} is already registered")]
    AlreadyRegistered(Address),
    #[error("invalid range: {0}")]
    InvalidRange(#[from] RangeError),
    #[error("base and limit ranges must differ")]
    IdenticalRanges,
    #[error("withdrawal of zero shares")]
    ZeroWithdrawal,
    #[error("vault has no shares outstanding")]
    EmptySupply,
    #[error("holder has {available} shares, {required} requested")]
    InsufficientShares {
        /// Shares held.
        available: U256,
        /// Shares requested.
        required: U256,
    },
    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),
    #[error("invalid recipient {0:?}")]
    InvalidRecipient(Address),
    #[error("token balance too low: {0}")]
    InsufficientBalance(LedgerError),
    #[error("fee rate {0} bps exceeds 10000")]
    InvalidFeeRate(u32),
    #[error("{0:?} has no active range")]
    NoActiveRange(Slot),
    #[error("pool rejected the operation: {0}")]
    PoolRejected(PoolError),
}

/// The caller is not allowed to perform the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("{caller:?} is not the owner")]
    NotOwner {
        /// Rejected caller.
        caller: Address,
    },
    #[error("{caller:?} is not the configured deposit gateway")]
    NotDepositGateway {
        /// Rejected caller.
        caller: Address,
    },
    #[error("share allowance {available} below {required}")]
    InsufficientShareAllowance {
        /// Allowance granted.
        available: U256,
        /// Shares requested.
        required: U256,
    },
    #[error("token allowance too low: {0}")]
    TokenAllowance(LedgerError),
}

/// Errors returned by vault and gateway operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("unauthorized: {0}")]
    Authorization(#[from] AuthorizationError),
    #[error("callback rejected: {0}")]
    Reentrancy(CallbackError),
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] MathError),
}

impl VaultError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::Reentrancy(_) => ErrorKind::Reentrancy,
            Self::Arithmetic(_) => ErrorKind::Arithmetic,
        }
    }
}

impl From<LedgerError> for VaultError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientAllowance { .. } => {
                AuthorizationError::TokenAllowance(err).into()
            }
            LedgerError::InsufficientBalance { .. } => {
                ValidationError::InsufficientBalance(err).into()
            }
            LedgerError::Overflow => MathError::Overflow.into(),
        }
    }
}

impl From<CallbackError> for VaultError {
    fn from(err: CallbackError) -> Self {
        match err {
            CallbackError::Payment(ledger) => ledger.into(),
            other => Self::Reentrancy(other),
        }
    }
}

impl From<PoolError> for VaultError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Math(math) => math.into(),
            PoolError::Range(range) => ValidationError::InvalidRange(range).into(),
            PoolError::Callback(callback) => callback.into(),
            PoolError::Ledger(ledger) => ledger.into(),
            other => ValidationError::PoolRejected(other).into(),
        }
    }
}

impl From<RangeError> for VaultError {
    fn from(err: RangeError) -> Self {
        ValidationError::InvalidRange(err).into()
    }
}
