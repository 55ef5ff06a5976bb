//! # Solver Doubles
//!
//! Three solvers, one per behavior the queue has to survive:
//!
//! - [`FundedSolver`] cooperates — optionally minting itself exactly the
//!   want-asset shortfall during the callback, like a market maker
//!   sourcing inventory just in time.
//! - [`FailingSolver`] errors out of the callback, exercising the
//!   journal unwind.
//! - [`ReentrantSolver`] abuses the queue reference in the handoff to
//!   attempt a nested settlement and a mid-flight request overwrite,
//!   recording what the guards said.

use std::sync::Arc;

use parking_lot::Mutex;

use basin_core::ports::{AssetLedger, SolveHandoff, Solver, SolverError};
use basin_core::Address;

use crate::ledger::MemoryLedger;

/// A cooperative solver.
pub struct FundedSolver {
    address: Address,
    ledger: Arc<MemoryLedger>,
    /// When set, mints the want-asset shortfall to itself inside the
    /// callback instead of relying on pre-funding.
    auto_fund: bool,
}

impl FundedSolver {
    /// A solver that must be pre-funded by the test.
    pub fn new(address: Address, ledger: Arc<MemoryLedger>) -> Self {
        Self {
            address,
            ledger,
            auto_fund: false,
        }
    }

    /// A solver that tops itself up during the callback.
    pub fn auto_funding(address: Address, ledger: Arc<MemoryLedger>) -> Self {
        Self {
            address,
            ledger,
            auto_fund: true,
        }
    }
}

impl Solver for FundedSolver {
    fn address(&self) -> Address {
        self.address
    }

    fn finish_solve(&self, handoff: SolveHandoff<'_>) -> Result<(), SolverError> {
        if self.auto_fund {
            let held = self.ledger.balance_of(handoff.want_asset, self.address);
            if held < handoff.total_wanted {
                self.ledger
                    .mint(handoff.want_asset, self.address, handoff.total_wanted - held);
            }
        }
        Ok(())
    }
}

/// A solver that always fails its callback. The escrowed offer assets
/// are left untouched, per the solver contract.
pub struct FailingSolver {
    address: Address,
}

impl FailingSolver {
    /// A solver doomed to disappoint.
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl Solver for FailingSolver {
    fn address(&self) -> Address {
        self.address
    }

    fn finish_solve(&self, _handoff: SolveHandoff<'_>) -> Result<(), SolverError> {
        Err(SolverError::new("liquidity source unavailable"))
    }
}

/// A solver that attacks the queue through the handoff and writes down
/// what happened. After probing it funds itself so the outer settlement
/// still completes — the interesting assertion is what the guards said,
/// not whether the batch died.
pub struct ReentrantSolver {
    address: Address,
    ledger: Arc<MemoryLedger>,
    /// The user whose request it tries to overwrite mid-settlement.
    probe_user: Address,
    observations: Mutex<Vec<String>>,
}

impl ReentrantSolver {
    /// Builds the attacker. `probe_user` should be a member of the batch
    /// so its request is locked when the callback runs.
    pub fn new(address: Address, ledger: Arc<MemoryLedger>, probe_user: Address) -> Self {
        Self {
            address,
            ledger,
            probe_user,
            observations: Mutex::new(Vec::new()),
        }
    }

    /// What the guards answered, in probe order.
    pub fn observations(&self) -> Vec<String> {
        self.observations.lock().clone()
    }
}

impl Solver for ReentrantSolver {
    fn address(&self) -> Address {
        self.address
    }

    fn finish_solve(&self, handoff: SolveHandoff<'_>) -> Result<(), SolverError> {
        let mut observations = self.observations.lock();

        // Probe 1: nested settlement on the same queue.
        let nested = handoff.queue.solve(
            handoff.initiator,
            handoff.offer_asset,
            handoff.want_asset,
            &[self.probe_user],
            handoff.run_data,
            self,
            0,
        );
        observations.push(match nested {
            Ok(_) => "nested solve: accepted".to_string(),
            Err(err) => format!("nested solve: {err}"),
        });

        // Probe 2: overwrite a locked request mid-settlement.
        let overwrite = handoff.queue.update_atomic_request(
            self.probe_user,
            handoff.offer_asset,
            handoff.want_asset,
            0,
            0,
        );
        observations.push(match overwrite {
            Ok(()) => "locked overwrite: accepted".to_string(),
            Err(err) => format!("locked overwrite: {err}"),
        });
        drop(observations);

        // Behave from here on so the outer settlement finishes.
        let held = self.ledger.balance_of(handoff.want_asset, self.address);
        if held < handoff.total_wanted {
            self.ledger
                .mint(handoff.want_asset, self.address, handoff.total_wanted - held);
        }
        Ok(())
    }
}
