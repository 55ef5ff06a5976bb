//! # Observable Mutation Records
//!
//! Every state-mutating operation in the core emits exactly one
//! [`VaultEvent`] describing what changed, with before/after values where
//! there is a before. Events flow out through an injected [`EventSink`];
//! the core never reads them back. External auditors, indexers, and the
//! test suite all hang off this seam.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::Address;

/// One observable mutation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    /// The engine entered the paused state (explicitly or by a rate push
    /// tripping the safety gate — see [`ExchangeRateUpdated`](Self::ExchangeRateUpdated)).
    Paused,
    /// The engine was explicitly unpaused.
    Unpaused,
    /// Minimum interval between explicit rate pushes changed.
    UpdateDelayChanged { old_secs: u64, new_secs: u64 },
    /// Upper rate-push bound changed (bps of the accrued rate).
    UpperBoundChanged { old_bps: u16, new_bps: u16 },
    /// Lower rate-push bound changed (bps of the accrued rate).
    LowerBoundChanged { old_bps: u16, new_bps: u16 },
    /// Annualized management fee changed.
    ManagementFeeChanged { old_bps: u16, new_bps: u16 },
    /// Fee payout destination changed.
    PayoutAddressChanged { old: Address, new: Address },
    /// An asset's rate provider or peg flag was registered/replaced.
    RateProviderSet { asset: Address, pegged: bool },
    /// Annualized lending rate changed (after checkpointing).
    LendingRateChanged { old_bps: u16, new_bps: u16 },
    /// Annualized protocol fee rate changed (after checkpointing).
    ProtocolFeeRateChanged { old_bps: u16, new_bps: u16 },
    /// Ceiling on the lending rate changed.
    MaxLendingRateChanged { old_bps: u16, new_bps: u16 },
    /// An explicit NAV overwrite was committed.
    ExchangeRateUpdated {
        /// Stored rate before the overwrite.
        old_rate: u128,
        /// The committed rate.
        new_rate: u128,
        /// True when this push tripped the bound/delay gate and paused
        /// the engine instead of collecting its management fee.
        paused_by_update: bool,
        /// Unix-seconds commit time.
        at: u64,
    },
    /// Accumulated fees were claimed and paid out.
    FeesClaimed {
        /// Asset the fees were paid in.
        asset: Address,
        /// Owed balance in base terms that was zeroed.
        amount_base: u128,
        /// Amount actually transferred, in `asset` terms.
        amount_asset: u128,
    },
    /// A user created or overwrote a pending settlement request.
    RequestUpdated {
        user: Address,
        offer_asset: Address,
        want_asset: Address,
        offer_amount: u128,
        deadline: u64,
    },
    /// One user's request was fulfilled inside a settlement batch.
    RequestFulfilled {
        /// Settlement run this fulfillment belongs to.
        run_id: Uuid,
        user: Address,
        offer_asset: Address,
        want_asset: Address,
        /// Amount escrowed from the user.
        offered: u128,
        /// Amount delivered to the user.
        received: u128,
        /// Unix-seconds settlement time.
        at: u64,
    },
    /// A settlement batch completed.
    BatchSettled {
        run_id: Uuid,
        offer_asset: Address,
        want_asset: Address,
        /// Number of requests fulfilled.
        users: usize,
        total_offered: u128,
        total_wanted: u128,
        at: u64,
    },
}

/// Destination for emitted events.
pub trait EventSink: Send + Sync {
    /// Receives one event. Must not fail; an observer that cannot keep up
    /// drops records, it does not stall settlement.
    fn emit(&self, event: VaultEvent);
}

/// Default sink: structured log line per event, nothing retained.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: VaultEvent) {
        tracing::info!(event = ?event, "vault event");
    }
}

/// Sink that discards everything. For benchmarks and throwaway fixtures.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: VaultEvent) {}
}

/// Shared handle to a sink, the form the engine and queue hold.
pub type SharedSink = Arc<dyn EventSink>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = VaultEvent::ExchangeRateUpdated {
            old_rate: 1_000_000_000_000_000_000,
            new_rate: 1_010_000_000_000_000_000,
            paused_by_update: false,
            at: 1_700_000_000,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: VaultEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn null_sink_accepts_anything() {
        NullSink.emit(VaultEvent::Paused);
        NullSink.emit(VaultEvent::Unpaused);
    }
}
