//! # The Accountant
//!
//! The engine that owns [`AccountingState`] and [`LendingInfo`] and every
//! operation that touches them: on-demand accrual, checkpoints, the
//! bounded explicit rate push, parameter setters, fee claims, and rate
//! queries.
//!
//! The one non-obvious behavior, worth reading twice: an explicit rate
//! push that violates the bound/delay gate does **not** fail. It pauses
//! the engine, discards the management fee it just computed, and still
//! commits the pushed rate, the share snapshot, and the timestamp. The
//! oracle's scheduler must never see its push revert; operators poll
//! `is_paused` to find out the gate fired.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;

use crate::address::Address;
use crate::config::{
    AccountantConfig, BPS_SCALE, INTERNAL_DECIMALS, MAX_MANAGEMENT_FEE_BPS,
    MAX_UPDATE_DELAY_SECS, SECONDS_PER_YEAR, WAD,
};
use crate::events::{SharedSink, VaultEvent};
use crate::math::{self, MathError};
use crate::ports::{AssetLedger, Authorizer, LedgerError, Operation, ShareLedger};

use super::state::{AccountingState, LendingInfo, RateProviderEntry};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the accounting engine.
#[derive(Debug, Error)]
pub enum AccountantError {
    /// Upper rate-push bound must be at least 1.0x (10_000 bps).
    #[error("upper bound {bps} bps is below 10000 (1.0x)")]
    UpperBoundTooLow {
        /// The rejected value.
        bps: u16,
    },

    /// Lower rate-push bound must be at most 1.0x (10_000 bps).
    #[error("lower bound {bps} bps is above 10000 (1.0x)")]
    LowerBoundTooHigh {
        /// The rejected value.
        bps: u16,
    },

    /// Management fee is capped at 20%.
    #[error("management fee {bps} bps exceeds cap of {MAX_MANAGEMENT_FEE_BPS}")]
    ManagementFeeTooHigh {
        /// The rejected value.
        bps: u16,
    },

    /// Minimum update delay is capped at 14 days.
    #[error("update delay {secs}s exceeds cap of {MAX_UPDATE_DELAY_SECS}s")]
    UpdateDelayTooLong {
        /// The rejected value.
        secs: u64,
    },

    /// Lending rate may not exceed the configured ceiling.
    #[error("lending rate {bps} bps exceeds max of {max_bps}")]
    LendingRateAboveMax {
        /// The rejected value.
        bps: u16,
        /// The active ceiling.
        max_bps: u16,
    },

    /// The ceiling may not undercut the active lending rate.
    #[error("max lending rate {bps} bps is below the active lending rate {current_bps}")]
    MaxLendingRateBelowCurrent {
        /// The rejected ceiling.
        bps: u16,
        /// The lending rate in effect.
        current_bps: u16,
    },

    /// The authorization gate refused the caller.
    #[error("caller {caller} is not authorized for {operation:?}")]
    Unauthorized {
        /// Who asked.
        caller: Address,
        /// What they asked for.
        operation: Operation,
    },

    /// Fee claims are restricted to the vault share ledger as caller.
    #[error("fee claim from {caller}, only the vault may claim")]
    OnlyVaultMayClaim {
        /// Who asked.
        caller: Address,
    },

    /// The operation requires the engine to be active, but it is paused.
    #[error("accounting engine is paused")]
    Paused,

    /// Fee claim with nothing owed.
    #[error("no fees owed")]
    NoFeesOwed,

    /// Conversion needs a price for an asset with no registered provider
    /// and no peg.
    #[error("no rate provider registered for asset {asset}")]
    NoRateProvider {
        /// The unpriceable asset.
        asset: Address,
    },

    /// A rate provider answered zero, which no division wants to hear.
    #[error("rate provider for asset {asset} returned a zero price")]
    ZeroPrice {
        /// The asset whose feed went dark.
        asset: Address,
    },

    /// Arithmetic failure. With sane decimals and supplies this means the
    /// inputs were corrupt, not that the math ran out of room.
    #[error(transparent)]
    Math(#[from] MathError),

    /// The asset ledger refused an operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What an explicit rate push did. Returned instead of an error because
/// the gate-violation path is a state transition, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateUpdateOutcome {
    /// True when the bound/delay gate fired and paused the engine.
    pub paused_by_update: bool,
    /// Management fee added to `fees_owed_in_base` (zero when the gate
    /// fired — the computed delta is discarded on violation).
    pub fee_delta: u128,
    /// The accrued rate the push was measured against.
    pub accrued_rate: u128,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The rate/fee accounting engine. One per vault.
///
/// All operations take `&self` plus an explicit `now` in unix seconds.
/// Lock order, where both are taken: accounting state, then lending info.
pub struct Accountant {
    base_asset: Address,
    base_decimals: u8,
    share_asset: Address,
    share_decimals: u8,
    state: RwLock<AccountingState>,
    lending: RwLock<LendingInfo>,
    providers: DashMap<Address, RateProviderEntry>,
    shares: Arc<dyn ShareLedger>,
    ledger: Arc<dyn AssetLedger>,
    auth: Arc<dyn Authorizer>,
    sink: SharedSink,
}

impl Accountant {
    /// Builds the engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Any domain violation a runtime setter would reject is rejected
    /// here too, plus [`LedgerError::UnknownAsset`] if the base asset has
    /// no decimals entry.
    pub fn new(
        config: AccountantConfig,
        shares: Arc<dyn ShareLedger>,
        ledger: Arc<dyn AssetLedger>,
        auth: Arc<dyn Authorizer>,
        sink: SharedSink,
    ) -> Result<Self, AccountantError> {
        if config.allowed_change_upper_bps < BPS_SCALE as u16 {
            return Err(AccountantError::UpperBoundTooLow {
                bps: config.allowed_change_upper_bps,
            });
        }
        if config.allowed_change_lower_bps > BPS_SCALE as u16 {
            return Err(AccountantError::LowerBoundTooHigh {
                bps: config.allowed_change_lower_bps,
            });
        }
        if config.management_fee_bps > MAX_MANAGEMENT_FEE_BPS {
            return Err(AccountantError::ManagementFeeTooHigh {
                bps: config.management_fee_bps,
            });
        }
        if config.minimum_update_delay_secs > MAX_UPDATE_DELAY_SECS {
            return Err(AccountantError::UpdateDelayTooLong {
                secs: config.minimum_update_delay_secs,
            });
        }
        if config.lending_rate_bps > config.max_lending_rate_bps {
            return Err(AccountantError::LendingRateAboveMax {
                bps: config.lending_rate_bps,
                max_bps: config.max_lending_rate_bps,
            });
        }

        let base_decimals = ledger.decimals(config.base_asset)?;
        let share_decimals = shares.share_decimals();
        let total_shares = shares.total_shares();

        let state = AccountingState {
            payout_address: config.payout_address,
            fees_owed_in_base: 0,
            total_shares_last_update: total_shares,
            exchange_rate: config.starting_exchange_rate,
            allowed_change_upper_bps: config.allowed_change_upper_bps,
            allowed_change_lower_bps: config.allowed_change_lower_bps,
            last_update_timestamp: config.genesis_time,
            is_paused: false,
            minimum_update_delay_secs: config.minimum_update_delay_secs,
            management_fee_bps: config.management_fee_bps,
        };
        let lending = LendingInfo {
            lending_rate_bps: config.lending_rate_bps,
            protocol_fee_rate_bps: config.protocol_fee_rate_bps,
            max_lending_rate_bps: config.max_lending_rate_bps,
            last_accrual_time: config.genesis_time,
        };

        tracing::info!(
            base_asset = %config.base_asset,
            share_asset = %config.share_asset,
            starting_rate = config.starting_exchange_rate,
            lending_bps = config.lending_rate_bps,
            protocol_fee_bps = config.protocol_fee_rate_bps,
            "accountant constructed"
        );

        Ok(Self {
            base_asset: config.base_asset,
            base_decimals,
            share_asset: config.share_asset,
            share_decimals,
            state: RwLock::new(state),
            lending: RwLock::new(lending),
            providers: DashMap::new(),
            shares,
            ledger,
            auth,
            sink,
        })
    }

    // -- plain accessors ----------------------------------------------------

    /// The base asset all rates and fees are denominated in.
    pub fn base_asset(&self) -> Address {
        self.base_asset
    }

    /// Native decimals of the base asset (also the rate's precision).
    pub fn base_decimals(&self) -> u8 {
        self.base_decimals
    }

    /// The vault's share token.
    pub fn share_asset(&self) -> Address {
        self.share_asset
    }

    /// Native decimals of the share token.
    pub fn share_decimals(&self) -> u8 {
        self.share_decimals
    }

    /// The asset ledger this engine was wired with.
    pub(crate) fn ledger(&self) -> &Arc<dyn AssetLedger> {
        &self.ledger
    }

    /// Current pause flag.
    pub fn is_paused(&self) -> bool {
        self.state.read().is_paused
    }

    /// Stored (not accrued) fees owed, in base terms.
    pub fn fees_owed_in_base(&self) -> u128 {
        self.state.read().fees_owed_in_base
    }

    /// Copy of the full accounting record, for observability.
    pub fn state_snapshot(&self) -> AccountingState {
        self.state.read().clone()
    }

    /// Copy of the lending record, for observability.
    pub fn lending_snapshot(&self) -> LendingInfo {
        *self.lending.read()
    }

    /// Sum of the lending and protocol fee rates: what a borrower of the
    /// vault's deposits pays in total. Informational only.
    pub fn borrower_rate_bps(&self) -> u32 {
        let lending = self.lending.read();
        lending.lending_rate_bps as u32 + lending.protocol_fee_rate_bps as u32
    }

    /// Lookup in the rate-provider registry.
    pub(crate) fn provider_entry(&self, asset: Address) -> Option<RateProviderEntry> {
        self.providers.get(&asset).map(|e| e.value().clone())
    }

    fn authorize(&self, caller: Address, operation: Operation) -> Result<(), AccountantError> {
        if self.auth.may_call(caller, operation) {
            Ok(())
        } else {
            Err(AccountantError::Unauthorized { caller, operation })
        }
    }

    // -- accrual (pure) -----------------------------------------------------

    /// Value accrued over `elapsed` seconds at `rate_bps` against the
    /// current deposits, in 18-decimal terms. The one formula both
    /// interest and protocol fees are computed with.
    fn accrued_value18(
        &self,
        exchange_rate: u128,
        total_shares: u128,
        rate_bps: u16,
        elapsed: u64,
    ) -> Result<u128, MathError> {
        let rate18 = math::scale_decimals(exchange_rate, self.base_decimals, INTERNAL_DECIMALS)?;
        let shares18 = math::scale_decimals(total_shares, self.share_decimals, INTERNAL_DECIMALS)?;
        let deposits18 = math::mul_div_down(shares18, rate18, WAD)?;
        math::mul_div_down(
            deposits18,
            rate_bps as u128 * elapsed as u128,
            SECONDS_PER_YEAR as u128 * BPS_SCALE,
        )
    }

    fn rate_with_interest_inner(
        &self,
        state: &AccountingState,
        lending: &LendingInfo,
        now: u64,
    ) -> Result<u128, MathError> {
        let total_shares = self.shares.total_shares();
        let elapsed = now.saturating_sub(lending.last_accrual_time);
        if total_shares == 0 || lending.lending_rate_bps == 0 || elapsed == 0 {
            return Ok(state.exchange_rate);
        }
        let interest18 = self.accrued_value18(
            state.exchange_rate,
            total_shares,
            lending.lending_rate_bps,
            elapsed,
        )?;
        let shares18 = math::scale_decimals(total_shares, self.share_decimals, INTERNAL_DECIMALS)?;
        let rate18 = math::scale_decimals(state.exchange_rate, self.base_decimals, INTERNAL_DECIMALS)?;
        let new18 = rate18
            .checked_add(math::mul_div_down(interest18, WAD, shares18)?)
            .ok_or(MathError::Overflow)?;
        math::scale_decimals(new18, INTERNAL_DECIMALS, self.base_decimals)
    }

    fn pending_protocol_fees_inner(
        &self,
        state: &AccountingState,
        lending: &LendingInfo,
        now: u64,
    ) -> Result<u128, MathError> {
        let total_shares = self.shares.total_shares();
        let elapsed = now.saturating_sub(lending.last_accrual_time);
        if total_shares == 0 || lending.protocol_fee_rate_bps == 0 || elapsed == 0 {
            return Ok(0);
        }
        let fee18 = self.accrued_value18(
            state.exchange_rate,
            total_shares,
            lending.protocol_fee_rate_bps,
            elapsed,
        )?;
        math::scale_decimals(fee18, INTERNAL_DECIMALS, self.base_decimals)
    }

    /// The stored rate plus live interest accrual. Read-only, callable
    /// while paused — rate observers always see live accrual.
    pub fn rate_with_interest(&self, now: u64) -> Result<u128, AccountantError> {
        let state = self.state.read();
        let lending = self.lending.read();
        Ok(self.rate_with_interest_inner(&state, &lending, now)?)
    }

    // -- checkpoints --------------------------------------------------------

    /// Folds pending protocol fees into `fees_owed_in_base` and advances
    /// the accrual clock. Does not touch the exchange rate.
    pub fn checkpoint_protocol_fees(&self, now: u64) -> Result<u128, AccountantError> {
        let state = &mut *self.state.write();
        let lending = &mut *self.lending.write();
        let fees = self.pending_protocol_fees_inner(state, lending, now)?;
        state.fees_owed_in_base = state
            .fees_owed_in_base
            .checked_add(fees)
            .ok_or(MathError::Overflow)?;
        lending.last_accrual_time = now;
        if fees > 0 {
            tracing::debug!(fees, total_owed = state.fees_owed_in_base, "protocol fees checkpointed");
        }
        Ok(fees)
    }

    /// Folds pending interest permanently into the exchange rate **and**
    /// pending protocol fees into `fees_owed_in_base`, advancing the
    /// clock. Called before a rate parameter changes so past accrual is
    /// attributed to the rate that was in effect while it accrued.
    pub fn checkpoint_interest_and_fees(&self, now: u64) -> Result<(), AccountantError> {
        let state = &mut *self.state.write();
        let lending = &mut *self.lending.write();
        // Fees first: they are computed against the pre-fold rate, same
        // as the interest itself.
        let fees = self.pending_protocol_fees_inner(state, lending, now)?;
        let new_rate = self.rate_with_interest_inner(state, lending, now)?;
        state.fees_owed_in_base = state
            .fees_owed_in_base
            .checked_add(fees)
            .ok_or(MathError::Overflow)?;
        state.exchange_rate = new_rate;
        lending.last_accrual_time = now;
        tracing::debug!(rate = new_rate, fees, "interest and fees checkpointed");
        Ok(())
    }

    // -- explicit rate push -------------------------------------------------

    /// Privileged NAV overwrite with the bounded-update safety gate.
    ///
    /// Fails only while paused or unauthorized. A push that trips the
    /// gate — too soon after the last one, or outside the allowed band
    /// around the accrued rate — pauses the engine, discards the computed
    /// management fee, and still commits the rate, the share snapshot,
    /// and the timestamp. See the module docs for why.
    pub fn update_exchange_rate(
        &self,
        caller: Address,
        new_rate: u128,
        now: u64,
    ) -> Result<RateUpdateOutcome, AccountantError> {
        self.authorize(caller, Operation::UpdateExchangeRate)?;

        let (outcome, old_rate, events) = {
            let state = &mut *self.state.write();
            let lending = &mut *self.lending.write();

            if state.is_paused {
                return Err(AccountantError::Paused);
            }

            // Accrual baseline for the gate, taken before the fee
            // checkpoint advances the clock.
            let accrued_rate = self.rate_with_interest_inner(state, lending, now)?;

            // Protocol fees checkpoint. Interest is not folded here: the
            // caller is supplying the new rate directly.
            let protocol_fees = self.pending_protocol_fees_inner(state, lending, now)?;
            state.fees_owed_in_base = state
                .fees_owed_in_base
                .checked_add(protocol_fees)
                .ok_or(MathError::Overflow)?;
            lending.last_accrual_time = now;

            // Management fee over the elapsed window, priced at the
            // smaller of old/new rate and the smaller of the current and
            // snapshotted share supply.
            let current_shares = self.shares.total_shares();
            let share_supply_to_use = current_shares.min(state.total_shares_last_update);
            let time_delta = now.saturating_sub(state.last_update_timestamp);
            let minimum_rate = state.exchange_rate.min(new_rate);

            let supply18 =
                math::scale_decimals(share_supply_to_use, self.share_decimals, INTERNAL_DECIMALS)?;
            let min_rate18 =
                math::scale_decimals(minimum_rate, self.base_decimals, INTERNAL_DECIMALS)?;
            let minimum_assets18 = math::mul_div_down(supply18, min_rate18, WAD)?;
            // Annualized fee first, then time proration. Two floors, in
            // that order: fusing them into one division rounds high and
            // over-collects by up to a base unit.
            let annual_fee18 =
                math::mul_div_down(minimum_assets18, state.management_fee_bps as u128, BPS_SCALE)?;
            let fee_delta18 =
                math::mul_div_down(annual_fee18, time_delta as u128, SECONDS_PER_YEAR as u128)?;
            let fee_delta = math::scale_decimals(fee_delta18, INTERNAL_DECIMALS, self.base_decimals)?;

            // The gate, evaluated after the fee computation and before
            // the commit. On violation the fee delta is discarded.
            let upper_limit =
                math::mul_div_down(accrued_rate, state.allowed_change_upper_bps as u128, BPS_SCALE)?;
            let lower_limit =
                math::mul_div_down(accrued_rate, state.allowed_change_lower_bps as u128, BPS_SCALE)?;
            let violated = time_delta < state.minimum_update_delay_secs
                || new_rate > upper_limit
                || new_rate < lower_limit;

            let mut events = Vec::with_capacity(2);
            let applied_fee = if violated {
                state.is_paused = true;
                events.push(VaultEvent::Paused);
                0
            } else {
                state.fees_owed_in_base = state
                    .fees_owed_in_base
                    .checked_add(fee_delta)
                    .ok_or(MathError::Overflow)?;
                fee_delta
            };

            // Unconditional commit, gate or no gate.
            let old_rate = state.exchange_rate;
            state.exchange_rate = new_rate;
            state.total_shares_last_update = current_shares;
            state.last_update_timestamp = now;

            events.push(VaultEvent::ExchangeRateUpdated {
                old_rate,
                new_rate,
                paused_by_update: violated,
                at: now,
            });

            (
                RateUpdateOutcome {
                    paused_by_update: violated,
                    fee_delta: applied_fee,
                    accrued_rate,
                },
                old_rate,
                events,
            )
        };

        if outcome.paused_by_update {
            tracing::warn!(
                old_rate,
                new_rate,
                accrued = outcome.accrued_rate,
                "rate push violated bounds or delay, engine paused"
            );
        } else {
            tracing::info!(old_rate, new_rate, fee_delta = outcome.fee_delta, "exchange rate updated");
        }
        for event in events {
            self.sink.emit(event);
        }
        Ok(outcome)
    }

    // -- rate parameter changes ---------------------------------------------

    /// Changes the lending rate, first attributing prior accrual to the
    /// outgoing rate.
    pub fn set_lending_rate(
        &self,
        caller: Address,
        rate_bps: u16,
        now: u64,
    ) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::SetLendingRate)?;
        let max_bps = self.lending.read().max_lending_rate_bps;
        if rate_bps > max_bps {
            return Err(AccountantError::LendingRateAboveMax { bps: rate_bps, max_bps });
        }
        self.checkpoint_interest_and_fees(now)?;
        let old_bps = {
            let mut lending = self.lending.write();
            let old = lending.lending_rate_bps;
            lending.lending_rate_bps = rate_bps;
            old
        };
        tracing::info!(old_bps, new_bps = rate_bps, "lending rate changed");
        self.sink.emit(VaultEvent::LendingRateChanged { old_bps, new_bps: rate_bps });
        Ok(())
    }

    /// Changes the protocol fee rate, first banking fees accrued at the
    /// outgoing rate.
    pub fn set_protocol_fee_rate(
        &self,
        caller: Address,
        rate_bps: u16,
        now: u64,
    ) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::SetProtocolFeeRate)?;
        self.checkpoint_protocol_fees(now)?;
        let old_bps = {
            let mut lending = self.lending.write();
            let old = lending.protocol_fee_rate_bps;
            lending.protocol_fee_rate_bps = rate_bps;
            old
        };
        tracing::info!(old_bps, new_bps = rate_bps, "protocol fee rate changed");
        self.sink
            .emit(VaultEvent::ProtocolFeeRateChanged { old_bps, new_bps: rate_bps });
        Ok(())
    }

    /// Raises or lowers the lending rate ceiling. Refuses to undercut the
    /// active lending rate, which would leave the state self-inconsistent.
    pub fn set_max_lending_rate(&self, caller: Address, rate_bps: u16) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::SetMaxLendingRate)?;
        let old_bps = {
            let mut lending = self.lending.write();
            if rate_bps < lending.lending_rate_bps {
                return Err(AccountantError::MaxLendingRateBelowCurrent {
                    bps: rate_bps,
                    current_bps: lending.lending_rate_bps,
                });
            }
            let old = lending.max_lending_rate_bps;
            lending.max_lending_rate_bps = rate_bps;
            old
        };
        self.sink
            .emit(VaultEvent::MaxLendingRateChanged { old_bps, new_bps: rate_bps });
        Ok(())
    }

    // -- administrative setters ---------------------------------------------

    /// Sets both rate-push bounds. Upper must be >= 1.0x, lower <= 1.0x.
    pub fn set_rate_bounds(
        &self,
        caller: Address,
        upper_bps: u16,
        lower_bps: u16,
    ) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::SetRateBounds)?;
        if upper_bps < BPS_SCALE as u16 {
            return Err(AccountantError::UpperBoundTooLow { bps: upper_bps });
        }
        if lower_bps > BPS_SCALE as u16 {
            return Err(AccountantError::LowerBoundTooHigh { bps: lower_bps });
        }
        let (old_upper, old_lower) = {
            let mut state = self.state.write();
            let old = (state.allowed_change_upper_bps, state.allowed_change_lower_bps);
            state.allowed_change_upper_bps = upper_bps;
            state.allowed_change_lower_bps = lower_bps;
            old
        };
        self.sink
            .emit(VaultEvent::UpperBoundChanged { old_bps: old_upper, new_bps: upper_bps });
        self.sink
            .emit(VaultEvent::LowerBoundChanged { old_bps: old_lower, new_bps: lower_bps });
        Ok(())
    }

    /// Sets the management fee. Capped at 20%.
    pub fn set_management_fee(&self, caller: Address, fee_bps: u16) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::SetManagementFee)?;
        if fee_bps > MAX_MANAGEMENT_FEE_BPS {
            return Err(AccountantError::ManagementFeeTooHigh { bps: fee_bps });
        }
        let old_bps = {
            let mut state = self.state.write();
            let old = state.management_fee_bps;
            state.management_fee_bps = fee_bps;
            old
        };
        self.sink
            .emit(VaultEvent::ManagementFeeChanged { old_bps, new_bps: fee_bps });
        Ok(())
    }

    /// Sets the minimum interval between rate pushes. Capped at 14 days.
    pub fn set_update_delay(&self, caller: Address, delay_secs: u64) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::SetUpdateDelay)?;
        if delay_secs > MAX_UPDATE_DELAY_SECS {
            return Err(AccountantError::UpdateDelayTooLong { secs: delay_secs });
        }
        let old_secs = {
            let mut state = self.state.write();
            let old = state.minimum_update_delay_secs;
            state.minimum_update_delay_secs = delay_secs;
            old
        };
        self.sink
            .emit(VaultEvent::UpdateDelayChanged { old_secs, new_secs: delay_secs });
        Ok(())
    }

    /// Redirects future fee claims.
    pub fn set_payout_address(&self, caller: Address, payout: Address) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::SetPayoutAddress)?;
        let old = {
            let mut state = self.state.write();
            let old = state.payout_address;
            state.payout_address = payout;
            old
        };
        self.sink.emit(VaultEvent::PayoutAddressChanged { old, new: payout });
        Ok(())
    }

    /// Registers or replaces an asset's pricing entry.
    pub fn set_rate_provider(
        &self,
        caller: Address,
        asset: Address,
        entry: RateProviderEntry,
    ) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::SetRateProvider)?;
        let pegged = entry.is_pegged();
        self.providers.insert(asset, entry);
        tracing::info!(%asset, pegged, "rate provider set");
        self.sink.emit(VaultEvent::RateProviderSet { asset, pegged });
        Ok(())
    }

    // -- pause state machine ------------------------------------------------

    /// Explicit transition Active -> Paused. Idempotent.
    pub fn pause(&self, caller: Address) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::Pause)?;
        self.state.write().is_paused = true;
        tracing::warn!("accounting engine paused");
        self.sink.emit(VaultEvent::Paused);
        Ok(())
    }

    /// Explicit transition Paused -> Active. The only way back.
    pub fn unpause(&self, caller: Address) -> Result<(), AccountantError> {
        self.authorize(caller, Operation::Unpause)?;
        self.state.write().is_paused = false;
        tracing::info!("accounting engine unpaused");
        self.sink.emit(VaultEvent::Unpaused);
        Ok(())
    }

    // -- fee claim ----------------------------------------------------------

    /// Pays out all accumulated fees in `asset` terms.
    ///
    /// Restricted to the vault share ledger as direct caller. Checkpoints
    /// protocol fees first, converts the owed base amount through the
    /// shared peg/price routine, and zeroes the owed balance before the
    /// ledger transfer so a reentrant claim finds nothing left.
    pub fn claim_fees(
        &self,
        caller: Address,
        asset: Address,
        now: u64,
    ) -> Result<u128, AccountantError> {
        if self.is_paused() {
            return Err(AccountantError::Paused);
        }
        if caller != self.share_asset {
            return Err(AccountantError::OnlyVaultMayClaim { caller });
        }

        self.checkpoint_protocol_fees(now)?;

        let (owed_base, payout) = {
            let state = self.state.read();
            (state.fees_owed_in_base, state.payout_address)
        };
        if owed_base == 0 {
            return Err(AccountantError::NoFeesOwed);
        }

        let amount_asset = self.base_to_asset_terms(asset, owed_base)?;
        self.state.write().fees_owed_in_base = 0;

        if let Err(err) = self.ledger.transfer_from(asset, caller, payout, amount_asset) {
            // The claim must be all-or-nothing: put the owed balance back
            // before surfacing the ledger failure.
            self.state.write().fees_owed_in_base = owed_base;
            return Err(err.into());
        }

        tracing::info!(%asset, owed_base, amount_asset, "fees claimed");
        self.sink.emit(VaultEvent::FeesClaimed {
            asset,
            amount_base: owed_base,
            amount_asset,
        });
        Ok(amount_asset)
    }

    // -- queries ------------------------------------------------------------

    /// Accrued NAV in base terms. Always available, paused or not.
    pub fn get_rate(&self, now: u64) -> Result<u128, AccountantError> {
        self.rate_with_interest(now)
    }

    /// Accrued NAV, refusing to answer while paused.
    pub fn get_rate_safe(&self, now: u64) -> Result<u128, AccountantError> {
        if self.is_paused() {
            return Err(AccountantError::Paused);
        }
        self.rate_with_interest(now)
    }

    /// Accrued NAV converted into `quote` terms through the shared
    /// peg/price routine.
    pub fn get_rate_in_quote(&self, quote: Address, now: u64) -> Result<u128, AccountantError> {
        let rate = self.rate_with_interest(now)?;
        self.base_to_asset_terms(quote, rate)
    }

    /// Same as [`get_rate_in_quote`](Self::get_rate_in_quote), refusing
    /// while paused.
    pub fn get_rate_in_quote_safe(&self, quote: Address, now: u64) -> Result<u128, AccountantError> {
        if self.is_paused() {
            return Err(AccountantError::Paused);
        }
        self.get_rate_in_quote(quote, now)
    }

    /// Stored fees plus the unrealized protocol-fee estimate, without
    /// mutating anything.
    pub fn preview_fees_owed(&self, now: u64) -> Result<u128, AccountantError> {
        let state = self.state.read();
        let lending = self.lending.read();
        let pending = self.pending_protocol_fees_inner(&state, &lending, now)?;
        state
            .fees_owed_in_base
            .checked_add(pending)
            .ok_or_else(|| MathError::Overflow.into())
    }
}
