//! # Rate/Fee Accounting Engine
//!
//! Owns the vault's NAV — the exchange rate between one share and the base
//! asset — and everything that moves it: time-based interest accrual,
//! protocol and management fee bookkeeping, explicit oracle rate pushes
//! with a bounded-update safety gate, and fee claims.
//!
//! ```text
//! state.rs    — AccountingState, LendingInfo, RateProviderEntry
//! engine.rs   — The Accountant: accrual, checkpoints, setters, claims
//! convert.rs  — Peg/price/decimal value conversion (shared with the queue)
//! ```
//!
//! ## Design Principles
//!
//! 1. **Accrual is pure.** `rate_with_interest(now)` is a function of the
//!    stored state and the supplied clock, nothing else. There is no
//!    background task; every observer computes live accrual on demand.
//!
//! 2. **Checkpoint before you touch a rate.** Any operation that changes a
//!    rate parameter first folds pending accrual into persistent state, so
//!    past growth is attributed to the rate that was in effect while it
//!    accrued.
//!
//! 3. **Degrade, don't revert.** An out-of-bounds or too-frequent rate
//!    push pauses the engine but still commits — an off-chain scheduler's
//!    push must never itself fail.
//!
//! 4. **Time is injected.** Every operation takes `now` as unix seconds.
//!    The engine never reads a clock, which makes every accrual scenario
//!    exactly reproducible in tests.

pub mod convert;
pub mod engine;
pub mod state;

pub use engine::{Accountant, AccountantError, RateUpdateOutcome};
pub use state::{AccountingState, LendingInfo, RateProviderEntry};
