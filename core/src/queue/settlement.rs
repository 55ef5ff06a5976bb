//! # The Settlement Queue
//!
//! Registration, NAV-based pricing, and the three-phase atomic `solve`.
//!
//! Rust gives us no ambient transaction to lean on, so atomicity is
//! explicit: every transfer executed and every request mutated during a
//! settlement attempt is recorded in an undo journal, and any failure in
//! any phase — a bad request, a zero price, the solver erroring out, a
//! finalize transfer bouncing — unwinds the journal completely before the
//! error is returned. Transfers are reversed in LIFO order, request
//! records are restored from their snapshots, and no request is ever left
//! locked.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use uuid::Uuid;

use crate::accountant::{Accountant, AccountantError};
use crate::address::Address;
use crate::config::{INTERNAL_DECIMALS, WAD};
use crate::events::{SharedSink, VaultEvent};
use crate::math::{self, MathError};
use crate::ports::{
    AssetLedger, Authorizer, LedgerError, Operation, SolveHandoff, Solver, SolverError,
};

use super::request::{
    AtomicRequest, RequestFlaws, RequestKey, SolveMetadata, SolvePreview,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the settlement queue. Every variant aborts the whole
/// enclosing operation; a settlement that returns one of these has
/// already been fully unwound.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The authorization gate refused the caller.
    #[error("caller {caller} is not authorized for {operation:?}")]
    Unauthorized {
        /// Who asked.
        caller: Address,
        /// What they asked for.
        operation: Operation,
    },

    /// A settlement is already executing on this queue instance. Nested
    /// and concurrent `solve` calls are refused, not queued.
    #[error("a settlement is already in progress on this queue")]
    SolveInProgress,

    /// A batch member's request is locked by another in-flight
    /// settlement, or a user overwrite hit a locked request.
    #[error("request of user {user} is locked by an in-flight settlement")]
    RequestLocked {
        /// The locked request's owner.
        user: Address,
    },

    /// A batch member's deadline has passed.
    #[error("request of user {user} expired at {deadline}, now {now}")]
    RequestExpired {
        /// The expired request's owner.
        user: Address,
        /// The deadline that passed.
        deadline: u64,
        /// Evaluation time.
        now: u64,
    },

    /// A batch member has nothing pending.
    #[error("request of user {user} has a zero offer amount")]
    ZeroOfferAmount {
        /// The empty request's owner.
        user: Address,
    },

    /// A batch member's offer prices to zero of the want asset.
    #[error("request of user {user} prices to a zero want amount")]
    ZeroWantAmount {
        /// The affected request's owner.
        user: Address,
    },

    /// `solve` was called with no users.
    #[error("settlement batch is empty")]
    EmptyBatch,

    /// The batch summed to zero on one side. Unreachable when every
    /// member passed its own checks; kept as a terminal backstop.
    #[error("settlement batch totals to zero (offered {total_offered}, wanted {total_wanted})")]
    ZeroBatchTotal {
        /// Aggregate offered.
        total_offered: u128,
        /// Aggregate wanted.
        total_wanted: u128,
    },

    /// A lock set in the prepare phase was gone at finalize. This means
    /// per-user state was clobbered while the solver held control — an
    /// invariant breach, reported and unwound like everything else.
    #[error("lock of user {user} vanished before finalize")]
    LockVanished {
        /// The affected request's owner.
        user: Address,
    },

    /// Pricing failed in the accounting engine.
    #[error(transparent)]
    Accountant(#[from] AccountantError),

    /// The asset ledger refused a transfer.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The solver's callback failed.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// Arithmetic failure while aggregating totals.
    #[error(transparent)]
    Math(#[from] MathError),
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// One fulfilled request inside a settlement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fulfillment {
    /// The request's owner.
    pub user: Address,
    /// Amount escrowed from the user.
    pub offered: u128,
    /// Amount delivered to the user.
    pub received: u128,
}

/// Result of a successful settlement run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SolveReceipt {
    /// Identifier shared by every event this run emitted.
    pub run_id: Uuid,
    /// Sum of all escrowed offer amounts.
    pub total_offered: u128,
    /// Sum of all delivered want amounts.
    pub total_wanted: u128,
    /// Per-user outcomes, in batch order.
    pub fulfilled: Vec<Fulfillment>,
}

// ---------------------------------------------------------------------------
// Undo journal
// ---------------------------------------------------------------------------

/// Everything a settlement attempt has changed so far, so it can be
/// changed back. Request snapshots restore in any order; transfers must
/// reverse LIFO so intermediate balances never go negative.
struct SolveJournal {
    transfers: Vec<(Address, Address, Address, u128)>, // (asset, from, to, amount)
    requests: Vec<(RequestKey, AtomicRequest)>,
}

impl SolveJournal {
    fn new() -> Self {
        Self {
            transfers: Vec::new(),
            requests: Vec::new(),
        }
    }

    /// Executes a transfer and records it for potential reversal.
    fn transfer(
        &mut self,
        ledger: &dyn AssetLedger,
        asset: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        ledger.transfer_from(asset, from, to, amount)?;
        self.transfers.push((asset, from, to, amount));
        Ok(())
    }

    /// Snapshots a request record before its first mutation in this run.
    fn snapshot(&mut self, key: RequestKey, request: AtomicRequest) {
        self.requests.push((key, request));
    }

    /// Reverses every recorded mutation. Transfer reversal is best
    /// effort: a ledger that executed a move forward and refuses the
    /// identical move backward is broken, and all we can do is log it
    /// and keep unwinding.
    fn unwind(self, ledger: &dyn AssetLedger, requests: &RwLock<HashMap<RequestKey, AtomicRequest>>) {
        for (asset, from, to, amount) in self.transfers.into_iter().rev() {
            if let Err(err) = ledger.transfer_from(asset, to, from, amount) {
                tracing::error!(%asset, %from, %to, amount, %err, "journal unwind transfer failed");
            }
        }
        let mut map = requests.write();
        for (key, snapshot) in self.requests {
            map.insert(key, snapshot);
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// The atomic settlement queue. One per vault, sharing the vault's
/// accountant, ledger, and authorization gate.
pub struct SettlementQueue {
    /// The queue's own ledger identity: the spender users grant
    /// allowances to. Advisory checks test against this address.
    address: Address,
    accountant: Arc<Accountant>,
    ledger: Arc<dyn AssetLedger>,
    auth: Arc<dyn Authorizer>,
    sink: SharedSink,
    requests: RwLock<HashMap<RequestKey, AtomicRequest>>,
    /// Whole-operation settlement guard. `try_lock`, never blocking: a
    /// second settlement while one runs is an error, not a queue.
    solve_guard: Mutex<()>,
}

impl SettlementQueue {
    /// Builds a queue over an existing accountant. The ledger and
    /// authorizer are shared with it.
    pub fn new(
        address: Address,
        accountant: Arc<Accountant>,
        ledger: Arc<dyn AssetLedger>,
        auth: Arc<dyn Authorizer>,
        sink: SharedSink,
    ) -> Self {
        Self {
            address,
            accountant,
            ledger,
            auth,
            sink,
            requests: RwLock::new(HashMap::new()),
            solve_guard: Mutex::new(()),
        }
    }

    /// The queue's ledger identity.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The accounting engine this queue prices against.
    pub fn accountant(&self) -> &Arc<Accountant> {
        &self.accountant
    }

    // -- registration -------------------------------------------------------

    /// Creates or overwrites `user`'s pending request for the given asset
    /// pair. Any values are accepted — a zero amount is a cancellation —
    /// but a request locked by an in-flight settlement cannot be touched.
    pub fn update_atomic_request(
        &self,
        user: Address,
        offer_asset: Address,
        want_asset: Address,
        offer_amount: u128,
        deadline: u64,
    ) -> Result<(), QueueError> {
        let key = RequestKey {
            user,
            offer_asset,
            want_asset,
        };
        {
            let mut map = self.requests.write();
            if map.get(&key).is_some_and(|r| r.in_solve) {
                return Err(QueueError::RequestLocked { user });
            }
            map.insert(key, AtomicRequest::new(deadline, offer_amount));
        }
        tracing::debug!(%user, %offer_asset, %want_asset, offer_amount, deadline, "request updated");
        self.sink.emit(VaultEvent::RequestUpdated {
            user,
            offer_asset,
            want_asset,
            offer_amount,
            deadline,
        });
        Ok(())
    }

    /// Copy of `user`'s pending request for the pair; an all-zero record
    /// when none exists.
    pub fn get_user_atomic_request(
        &self,
        user: Address,
        offer_asset: Address,
        want_asset: Address,
    ) -> AtomicRequest {
        let key = RequestKey {
            user,
            offer_asset,
            want_asset,
        };
        self.requests.read().get(&key).copied().unwrap_or_default()
    }

    /// Advisory: would this request settle right now? True requires a
    /// nonzero amount, an unexpired deadline, a sufficient balance, and a
    /// sufficient allowance towards the queue. State can change between
    /// this answer and an actual settlement.
    pub fn is_atomic_request_valid(
        &self,
        offer_asset: Address,
        user: Address,
        request: &AtomicRequest,
        now: u64,
    ) -> bool {
        request.offer_amount > 0
            && request.deadline >= now
            && self.ledger.balance_of(offer_asset, user) >= request.offer_amount
            && self.ledger.allowance(offer_asset, user, self.address) >= request.offer_amount
    }

    // -- pricing ------------------------------------------------------------

    /// Prices an offer at the current NAV. Three cases: offering shares
    /// (withdrawal), wanting shares (deposit), neither (asset-to-asset).
    /// Shares the conversion routine with fee claims and previews, so
    /// preview and execution cannot drift.
    pub fn calculate_want_amount(
        &self,
        offer_asset: Address,
        want_asset: Address,
        offer_amount: u128,
        now: u64,
    ) -> Result<u128, QueueError> {
        let share_asset = self.accountant.share_asset();
        // The unsafe rate on purpose: pausing gates privileged mutation
        // and safe reads, not settlement.
        let rate = self.accountant.get_rate(now)?;
        let rate18 = math::scale_decimals(rate, self.accountant.base_decimals(), INTERNAL_DECIMALS)?;

        if offer_asset == share_asset {
            let shares18 = math::scale_decimals(
                offer_amount,
                self.accountant.share_decimals(),
                INTERNAL_DECIMALS,
            )?;
            let value18 = math::mul_div_down(shares18, rate18, WAD)?;
            Ok(self.accountant.value18_to_asset(want_asset, value18)?)
        } else if want_asset == share_asset {
            let value18 = self.accountant.asset_to_value18(offer_asset, offer_amount)?;
            let shares18 = math::mul_div_down(value18, WAD, rate18)?;
            Ok(math::scale_decimals(
                shares18,
                INTERNAL_DECIMALS,
                self.accountant.share_decimals(),
            )?)
        } else {
            let value18 = self.accountant.asset_to_value18(offer_asset, offer_amount)?;
            Ok(self.accountant.value18_to_asset(want_asset, value18)?)
        }
    }

    /// Advisory batch preview: per-user flaw flags and would-be want
    /// amounts, with aggregate totals over the flaw-free members. Prices
    /// through [`calculate_want_amount`](Self::calculate_want_amount).
    pub fn view_solve_metadata(
        &self,
        offer_asset: Address,
        want_asset: Address,
        users: &[Address],
        now: u64,
    ) -> Result<SolvePreview, QueueError> {
        let mut members = Vec::with_capacity(users.len());
        let mut total_offered: u128 = 0;
        let mut total_wanted: u128 = 0;

        for &user in users {
            let request = self.get_user_atomic_request(user, offer_asset, want_asset);
            let want_amount = if request.offer_amount > 0 {
                self.calculate_want_amount(offer_asset, want_asset, request.offer_amount, now)?
            } else {
                0
            };
            let flaws = RequestFlaws {
                locked: request.in_solve,
                expired: now > request.deadline,
                zero_offer: request.offer_amount == 0,
                zero_want: request.offer_amount > 0 && want_amount == 0,
                insufficient_balance: self.ledger.balance_of(offer_asset, user)
                    < request.offer_amount,
                insufficient_allowance: self.ledger.allowance(offer_asset, user, self.address)
                    < request.offer_amount,
            };
            if flaws.is_clean() {
                total_offered = total_offered
                    .checked_add(request.offer_amount)
                    .ok_or(MathError::Overflow)?;
                total_wanted = total_wanted
                    .checked_add(want_amount)
                    .ok_or(MathError::Overflow)?;
            }
            members.push(SolveMetadata {
                user,
                flaws,
                offer_amount: request.offer_amount,
                want_amount,
            });
        }

        Ok(SolvePreview {
            members,
            total_offered,
            total_wanted,
        })
    }

    // -- settlement ---------------------------------------------------------

    /// Executes one settlement batch, all-or-nothing.
    ///
    /// Restricted to callers the gate authorizes for [`Operation::Solve`].
    /// Fails with [`QueueError::SolveInProgress`] if any settlement —
    /// including a reentrant one launched from inside the solver callback
    /// — is already running on this queue.
    pub fn solve(
        &self,
        caller: Address,
        offer_asset: Address,
        want_asset: Address,
        users: &[Address],
        run_data: &[u8],
        solver: &dyn Solver,
        now: u64,
    ) -> Result<SolveReceipt, QueueError> {
        if !self.auth.may_call(caller, Operation::Solve) {
            return Err(QueueError::Unauthorized {
                caller,
                operation: Operation::Solve,
            });
        }
        let _guard = self
            .solve_guard
            .try_lock()
            .ok_or(QueueError::SolveInProgress)?;

        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, %offer_asset, %want_asset, batch = users.len(), "settlement started");

        let mut journal = SolveJournal::new();
        match self.solve_inner(
            caller, offer_asset, want_asset, users, run_data, solver, now, run_id, &mut journal,
        ) {
            Ok(receipt) => {
                tracing::info!(
                    %run_id,
                    total_offered = receipt.total_offered,
                    total_wanted = receipt.total_wanted,
                    "settlement completed"
                );
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(%run_id, %err, "settlement aborted, unwinding");
                journal.unwind(self.ledger.as_ref(), &self.requests);
                Err(err)
            }
        }
    }

    /// The three phases. Every mutation goes through `journal` so the
    /// caller can unwind on any error.
    #[allow(clippy::too_many_arguments)]
    fn solve_inner(
        &self,
        caller: Address,
        offer_asset: Address,
        want_asset: Address,
        users: &[Address],
        run_data: &[u8],
        solver: &dyn Solver,
        now: u64,
        run_id: Uuid,
        journal: &mut SolveJournal,
    ) -> Result<SolveReceipt, QueueError> {
        if users.is_empty() {
            return Err(QueueError::EmptyBatch);
        }
        let solver_address = solver.address();

        // Phase 1: validate, lock, price, and escrow each request in
        // batch order. Any flaw aborts the whole call.
        let mut total_offered: u128 = 0;
        let mut total_wanted: u128 = 0;
        let mut fulfilled = Vec::with_capacity(users.len());

        for &user in users {
            let key = RequestKey {
                user,
                offer_asset,
                want_asset,
            };
            let offer_amount = {
                let mut map = self.requests.write();
                let request = map.get_mut(&key).ok_or(QueueError::ZeroOfferAmount { user })?;
                if request.in_solve {
                    return Err(QueueError::RequestLocked { user });
                }
                if now > request.deadline {
                    return Err(QueueError::RequestExpired {
                        user,
                        deadline: request.deadline,
                        now,
                    });
                }
                if request.offer_amount == 0 {
                    return Err(QueueError::ZeroOfferAmount { user });
                }
                journal.snapshot(key, *request);
                request.in_solve = true;
                request.offer_amount
            };

            let want_amount =
                self.calculate_want_amount(offer_asset, want_asset, offer_amount, now)?;
            if want_amount == 0 {
                return Err(QueueError::ZeroWantAmount { user });
            }

            total_offered = total_offered
                .checked_add(offer_amount)
                .ok_or(MathError::Overflow)?;
            total_wanted = total_wanted
                .checked_add(want_amount)
                .ok_or(MathError::Overflow)?;

            // Optimistic escrow: the offer leaves the user before the
            // solver ever runs.
            journal.transfer(
                self.ledger.as_ref(),
                offer_asset,
                user,
                solver_address,
                offer_amount,
            )?;

            fulfilled.push(Fulfillment {
                user,
                offered: offer_amount,
                received: want_amount,
            });
        }

        if total_offered == 0 || total_wanted == 0 {
            return Err(QueueError::ZeroBatchTotal {
                total_offered,
                total_wanted,
            });
        }

        // Phase 2: the solver sources liquidity. Control is outside the
        // queue here; only the solve guard and the per-request locks
        // protect us.
        solver.finish_solve(SolveHandoff {
            run_data,
            initiator: caller,
            offer_asset,
            want_asset,
            total_offered,
            total_wanted,
            queue: self,
        })?;

        // Phase 3: pull each precomputed want amount from the solver and
        // clear the request, same order as phase 1. Fulfillment events
        // are buffered until the whole phase survives — an unwound batch
        // must not have published fulfillment records.
        let mut events = Vec::with_capacity(fulfilled.len() + 1);
        for fulfillment in &fulfilled {
            let key = RequestKey {
                user: fulfillment.user,
                offer_asset,
                want_asset,
            };
            {
                let map = self.requests.read();
                let still_locked = map.get(&key).map(|r| r.in_solve).unwrap_or(false);
                if !still_locked {
                    return Err(QueueError::LockVanished {
                        user: fulfillment.user,
                    });
                }
            }

            journal.transfer(
                self.ledger.as_ref(),
                want_asset,
                solver_address,
                fulfillment.user,
                fulfillment.received,
            )?;

            {
                let mut map = self.requests.write();
                if let Some(request) = map.get_mut(&key) {
                    request.offer_amount = 0;
                    request.deadline = 0;
                    request.in_solve = false;
                }
            }

            events.push(VaultEvent::RequestFulfilled {
                run_id,
                user: fulfillment.user,
                offer_asset,
                want_asset,
                offered: fulfillment.offered,
                received: fulfillment.received,
                at: now,
            });
        }

        events.push(VaultEvent::BatchSettled {
            run_id,
            offer_asset,
            want_asset,
            users: fulfilled.len(),
            total_offered,
            total_wanted,
            at: now,
        });
        for event in events {
            self.sink.emit(event);
        }

        Ok(SolveReceipt {
            run_id,
            total_offered,
            total_wanted,
            fulfilled,
        })
    }
}
