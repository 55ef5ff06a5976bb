// Copyright (c) 2026 Basin Contributors. MIT License.
// See LICENSE for details.

//! # Basin Core — Vault Accounting & Atomic Settlement
//!
//! The accounting and settlement core of a pooled-asset vault. Two
//! subsystems, deliberately joined at the hip:
//!
//! - **The accountant** owns the NAV — how much base asset one share is
//!   worth — along with its time-based accrual model, protocol and
//!   management fee bookkeeping, a bounded-update safety gate that
//!   degrades to paused instead of reverting, and fee claims.
//! - **The settlement queue** holds users' pending conversion requests
//!   and, on a solver's demand, prices a batch of them off the
//!   accountant's NAV and executes it atomically: escrow in, solver
//!   callback, delivery out — all of it or none of it.
//!
//! Everything else a vault needs — the share ledger, token transfers,
//! price feeds, role administration — is a collaborator behind a trait in
//! [`ports`]. The core asks; it never implements.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants and the engine's construction config.
//! - **address** — 20-byte participant/asset identifiers.
//! - **math** — Floor-rounding fixed-point math over `u128`, widened
//!   through `U256`. The only rounding policy in the crate.
//! - **ports** — Capability traits for every collaborator.
//! - **events** — Observable mutation records and the sink they flow to.
//! - **accountant** — The rate/fee engine.
//! - **queue** — The atomic settlement queue.
//!
//! ## Design Philosophy
//!
//! 1. Time is a parameter, not an ambient. Every operation takes `now`.
//! 2. One conversion routine. Preview and execution price identically
//!    because they are the same code.
//! 3. If it touches money, it has tests. Plural.

pub mod accountant;
pub mod address;
pub mod config;
pub mod events;
pub mod math;
pub mod ports;
pub mod queue;

pub use accountant::{Accountant, AccountantError, AccountingState, LendingInfo, RateProviderEntry};
pub use address::Address;
pub use config::AccountantConfig;
pub use events::{EventSink, NullSink, SharedSink, TracingSink, VaultEvent};
pub use math::MathError;
pub use ports::{
    AssetLedger, Authorizer, LedgerError, Operation, RateProvider, ShareLedger, SolveHandoff,
    Solver, SolverError,
};
pub use queue::{
    AtomicRequest, Fulfillment, QueueError, RequestFlaws, RequestKey, SettlementQueue,
    SolveMetadata, SolvePreview, SolveReceipt,
};
