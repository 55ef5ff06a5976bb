//! # Atomic Settlement Queue
//!
//! Per-user pending conversion requests, priced off the accountant's NAV
//! and settled all-or-nothing against an external solver.
//!
//! ```text
//! request.rs     — AtomicRequest, keys, advisory validity & previews
//! settlement.rs  — SettlementQueue: registration, pricing, solve
//! ```
//!
//! The ordering that makes `solve` safe against a hostile solver, in one
//! place so nobody reorders it by accident:
//!
//! 1. lock the user's request (`in_solve`),
//! 2. move the user's offered assets to the solver,
//! 3. hand control to the solver's callback,
//! 4. re-check the lock, pull the priced want amount back, clear.
//!
//! Steps 1 and 2 happen before step 3 so that a reentrant attempt to
//! settle the same user finds the lock already set and the escrow already
//! gone. A whole-operation guard additionally refuses any nested `solve`
//! on the same queue instance.

pub mod request;
pub mod settlement;

pub use request::{AtomicRequest, RequestFlaws, RequestKey, SolveMetadata, SolvePreview};
pub use settlement::{Fulfillment, QueueError, SettlementQueue, SolveReceipt};
