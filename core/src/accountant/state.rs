//! # Accounting State Records
//!
//! The two mutable records the engine owns for its whole lifetime, plus
//! the per-asset rate-provider registry entry. Both records are created
//! once at construction and mutated in place through
//! [`Accountant`](super::Accountant) operations — never reconstructed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::ports::RateProvider;

/// The engine's NAV and fee bookkeeping. One per vault, forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingState {
    /// Destination for claimed fees.
    pub payout_address: Address,

    /// Accumulated, unclaimed fees in base-asset units at base-asset
    /// decimals. Only ever grows, except the reset to zero on claim.
    pub fees_owed_in_base: u128,

    /// Total shares outstanding at the last explicit rate push. Fee
    /// computation uses `min(current, this)` so a supply spike right
    /// before a push cannot inflate the fee base.
    pub total_shares_last_update: u128,

    /// Current NAV: base-asset units per one whole share, at base-asset
    /// decimals.
    pub exchange_rate: u128,

    /// Upper bound for an explicit rate push, in bps of the accrued rate.
    /// 10_000 = the push may not exceed the accrued rate at all.
    pub allowed_change_upper_bps: u16,

    /// Lower bound for an explicit rate push, in bps of the accrued rate.
    pub allowed_change_lower_bps: u16,

    /// Unix seconds of the last explicit rate push. This is the fee/delay
    /// clock, distinct from the accrual checkpoint in [`LendingInfo`].
    pub last_update_timestamp: u64,

    /// Safety flag. While set: no rate pushes, no safe reads, no claims.
    /// Accrual math and parameter setters keep working.
    pub is_paused: bool,

    /// Minimum wall-clock seconds required between explicit rate pushes.
    pub minimum_update_delay_secs: u64,

    /// Annualized management fee in bps, charged on explicit rate pushes
    /// against the smaller of the old/new rate.
    pub management_fee_bps: u16,
}

/// The accrual parameters and their shared checkpoint clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingInfo {
    /// Annualized rate in bps at which the NAV grows.
    pub lending_rate_bps: u16,

    /// Annualized rate in bps at which protocol fees accrue against
    /// deposits. Accrues into `fees_owed_in_base`, never into the NAV.
    pub protocol_fee_rate_bps: u16,

    /// Ceiling for `lending_rate_bps`.
    pub max_lending_rate_bps: u16,

    /// Unix seconds of the last accrual checkpoint. Advanced whenever
    /// interest or fees are folded into persistent state.
    pub last_accrual_time: u64,
}

/// How an asset is priced in base terms: either declared 1:1 with the
/// base asset (decimals rescaling only), or through an external feed.
/// Exactly one of the two — the registry has no "both" state.
#[derive(Clone)]
pub enum RateProviderEntry {
    /// The asset trades 1:1 with base; skip external pricing entirely.
    PeggedToBase,
    /// External price feed, quoting in base-asset terms at the asset's
    /// native decimal precision.
    External(Arc<dyn RateProvider>),
}

impl RateProviderEntry {
    /// Returns `true` for the pegged variant.
    pub fn is_pegged(&self) -> bool {
        matches!(self, RateProviderEntry::PeggedToBase)
    }
}

impl fmt::Debug for RateProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateProviderEntry::PeggedToBase => write!(f, "PeggedToBase"),
            RateProviderEntry::External(_) => write!(f, "External(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPrice(u128);
    impl RateProvider for FixedPrice {
        fn price(&self) -> u128 {
            self.0
        }
    }

    #[test]
    fn provider_entry_peg_flag() {
        assert!(RateProviderEntry::PeggedToBase.is_pegged());
        assert!(!RateProviderEntry::External(Arc::new(FixedPrice(1))).is_pegged());
    }

    #[test]
    fn accounting_state_serialization_roundtrip() {
        let state = AccountingState {
            payout_address: Address::dev(9),
            fees_owed_in_base: 1_234,
            total_shares_last_update: 100,
            exchange_rate: 1_000_000,
            allowed_change_upper_bps: 10_050,
            allowed_change_lower_bps: 9_950,
            last_update_timestamp: 1_700_000_000,
            is_paused: false,
            minimum_update_delay_secs: 3_600,
            management_fee_bps: 200,
        };
        let json = serde_json::to_string(&state).expect("serialize");
        let back: AccountingState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, state);
    }
}
