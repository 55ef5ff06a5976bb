//! # Basin Testkit — Deterministic Collaborator Doubles
//!
//! In-memory implementations of every capability trait `basin-core`
//! consumes: a token/share ledger, settable price feeds, a role table,
//! a recording event sink, and three solvers with very different
//! manners. Used by the core's integration tests, the benchmarks, and
//! the demo binary.
//!
//! Everything here is deterministic. Time never comes from a clock —
//! the core takes `now` as a parameter and so do the fixtures — prices
//! and balances change only when a test changes them, and the recording
//! sink keeps events in emission order.

pub mod ledger;
pub mod price;
pub mod roles;
pub mod sink;
pub mod solvers;
pub mod world;

pub use ledger::MemoryLedger;
pub use price::StaticPrice;
pub use roles::RoleTable;
pub use sink::RecordingSink;
pub use solvers::{FailingSolver, FundedSolver, ReentrantSolver};
pub use world::DemoWorld;
