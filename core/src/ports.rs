//! # Collaborator Capability Traits
//!
//! The core consumes its collaborators — the share ledger, the asset
//! ledger, per-asset price feeds, the authorization gate, and the solver —
//! through the traits in this module and nothing else. None of them are
//! implemented here: production wires real ledgers in, tests wire in the
//! deterministic doubles from `basin-testkit`.

use thiserror::Error;

use crate::address::Address;
use crate::queue::SettlementQueue;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by an asset-ledger collaborator.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger has no entry for this asset.
    #[error("unknown asset {asset}")]
    UnknownAsset {
        /// The asset that was looked up.
        asset: Address,
    },

    /// A transfer was attempted past the payer's balance.
    #[error("insufficient balance of {asset}: {owner} holds {available}, transfer of {requested} requested")]
    InsufficientBalance {
        /// Asset being moved.
        asset: Address,
        /// Account being debited.
        owner: Address,
        /// Balance actually held.
        available: u128,
        /// Amount that was requested.
        requested: u128,
    },

    /// The ledger refused the transfer for a reason of its own.
    #[error("transfer refused by ledger: {reason}")]
    TransferRefused {
        /// Ledger-supplied explanation.
        reason: String,
    },
}

/// Error returned by a solver's callback. The queue treats any solver
/// failure identically — the whole batch is unwound — so a message is all
/// the structure this needs.
#[derive(Debug, Error)]
#[error("solver callback failed: {0}")]
pub struct SolverError(pub String);

impl SolverError {
    /// Convenience constructor.
    pub fn new(msg: impl Into<String>) -> Self {
        SolverError(msg.into())
    }
}

// ---------------------------------------------------------------------------
// Privileged operations
// ---------------------------------------------------------------------------

/// Every privileged operation in the core, named for the authorization
/// gate. The gate answers "may this caller invoke this operation" and the
/// core asks before each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Operation {
    /// Halt privileged rate mutation and safe reads.
    Pause,
    /// Resume from the paused state.
    Unpause,
    /// Change the minimum interval between explicit rate pushes.
    SetUpdateDelay,
    /// Change the bounded-update envelope around the accrued rate.
    SetRateBounds,
    /// Change the annualized management fee.
    SetManagementFee,
    /// Change the destination for claimed fees.
    SetPayoutAddress,
    /// Register or replace an asset's rate provider / peg flag.
    SetRateProvider,
    /// Push an explicit NAV overwrite.
    UpdateExchangeRate,
    /// Change the annualized lending rate.
    SetLendingRate,
    /// Change the annualized protocol fee rate.
    SetProtocolFeeRate,
    /// Change the ceiling on the lending rate.
    SetMaxLendingRate,
    /// Execute a settlement batch.
    Solve,
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Read-only view of the vault's share token.
pub trait ShareLedger: Send + Sync {
    /// Total shares outstanding, in the share token's native precision.
    fn total_shares(&self) -> u128;

    /// Native decimal precision of the share token.
    fn share_decimals(&self) -> u8;
}

/// Balance, allowance, and transfer surface of the token ledger.
///
/// The core is a trusted operator of this ledger: `transfer_from` moves
/// funds on the core's say-so, and implementations enforce balances, not
/// allowances. Allowances are reported separately so that the advisory
/// request-validity checks can flag a user who has not authorized the
/// queue, without the core ever depending on the ledger's approval rules.
pub trait AssetLedger: Send + Sync {
    /// Native decimal precision of an asset.
    fn decimals(&self, asset: Address) -> Result<u8, LedgerError>;

    /// Current balance of `owner` in `asset`. Unknown assets read as zero.
    fn balance_of(&self, asset: Address, owner: Address) -> u128;

    /// Amount `owner` has authorized `spender` to move. Advisory only.
    fn allowance(&self, asset: Address, owner: Address, spender: Address) -> u128;

    /// Moves `amount` of `asset` from `from` to `to`.
    fn transfer_from(
        &self,
        asset: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError>;
}

/// Price feed for one non-pegged asset: the asset's price in base-asset
/// terms, expressed at the asset's own native decimal precision.
pub trait RateProvider: Send + Sync {
    /// Current price. A zero here fails any conversion that consults it.
    fn price(&self) -> u128;
}

/// The capability gate in front of every privileged operation.
pub trait Authorizer: Send + Sync {
    /// May `caller` invoke `operation`?
    fn may_call(&self, caller: Address, operation: Operation) -> bool;
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Everything a solver gets to see during its callback, including a
/// reference back to the queue. The reference is deliberate: a solver
/// *can* attempt to reenter `solve` or touch requests mid-settlement, and
/// the queue's guards are what stop it — not an artificially narrowed API.
pub struct SolveHandoff<'a> {
    /// Opaque bytes supplied by the settlement initiator, passed through
    /// untouched.
    pub run_data: &'a [u8],
    /// The authorized caller that started this settlement.
    pub initiator: Address,
    /// Asset the users offered (already moved to the solver).
    pub offer_asset: Address,
    /// Asset the users want (must be available for the finalize phase).
    pub want_asset: Address,
    /// Sum of all offer amounts in the batch.
    pub total_offered: u128,
    /// Sum of all priced want amounts the finalize phase will pull.
    pub total_wanted: u128,
    /// The queue running this settlement.
    pub queue: &'a SettlementQueue,
}

/// External liquidity provider fulfilling a settlement batch.
///
/// Contract: when `finish_solve` returns `Ok`, `address()` must hold at
/// least `total_wanted` of the want asset for the finalize phase to pull.
/// When it returns `Err`, it must not have consumed the escrowed offer
/// assets — the queue moves them back to the users while unwinding.
pub trait Solver: Send + Sync {
    /// The ledger identity the queue escrows into and pulls from.
    fn address(&self) -> Address;

    /// Synchronous callback between the prepare and finalize phases.
    fn finish_solve(&self, handoff: SolveHandoff<'_>) -> Result<(), SolverError>;
}
