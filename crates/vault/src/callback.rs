//! Repayment handler armed for exactly one pool callback.

use clmm_vault_domain::token::{Address, TokenAmounts};
use clmm_vault_protocols::ledger::TokenLedger;
use clmm_vault_protocols::pool::{CallbackError, PoolCallback};
use primitive_types::U256;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Mint,
    Swap,
}

impl Request {
    fn name(self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::Swap => "swap",
        }
    }
}

/// Pays a pool out of `payer`'s balance, but only when invoked by the
/// expected pool, and only once.
#[derive(Debug, Clone)]
pub struct CallbackGuard {
    pool: Address,
    payer: Address,
    token0: Address,
    token1: Address,
    pending: Option<Request>,
}

impl CallbackGuard {
    /// Arms the guard for one mint callback from `pool`.
    pub fn for_mint(pool: Address, payer: Address, token0: Address, token1: Address) -> Self {
        Self {
            pool,
            payer,
            token0,
            token1,
            pending: Some(Request::Mint),
        }
    }

    /// Arms the guard for one swap callback from `pool`.
    pub fn for_swap(pool: Address, payer: Address, token0: Address, token1: Address) -> Self {
        Self {
            pending: Some(Request::Swap),
            ..Self::for_mint(pool, payer, token0, token1)
        }
    }

    /// Whether the armed callback has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn authorize(&mut self, caller: Address, request: Request) -> Result<(), CallbackError> {
        if caller != self.pool {
            warn!(expected = ?self.pool, actual = ?caller, "Rejected callback from unexpected caller");
            return Err(CallbackError::UnexpectedCaller {
                expected: self.pool,
                actual: caller,
            });
        }
        match self.pending.take() {
            Some(pending) if pending == request => Ok(()),
            pending => {
                self.pending = pending;
                warn!(request = request.name(), "Rejected callback with no pending request");
                Err(CallbackError::NoPendingRequest(request.name()))
            }
        }
    }
}

impl PoolCallback for CallbackGuard {
    fn on_mint(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        owed: TokenAmounts,
    ) -> Result<(), CallbackError> {
        self.authorize(caller, Request::Mint)?;
        ledger.transfer(self.token0, self.payer, caller, owed.amount0)?;
        ledger.transfer(self.token1, self.payer, caller, owed.amount1)?;
        Ok(())
    }

    fn on_swap(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        token_in: Address,
        amount_in: U256,
    ) -> Result<(), CallbackError> {
        self.authorize(caller, Request::Swap)?;
        if token_in != self.token0 && token_in != self.token1 {
            return Err(CallbackError::NoPendingRequest("foreign-token swap"));
        }
        ledger.transfer(token_in, self.payer, caller, amount_in)?;
        Ok(())
    }
}
