//! # Protocol Constants & Engine Configuration
//!
//! Every magic number in Basin lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! The second half of this module is [`AccountantConfig`] — the construction
//! parameters for the accounting engine. It is validated with exactly the
//! same domain checks as the runtime setters, so a configuration that would
//! be rejected at runtime is also rejected at boot.

use serde::{Deserialize, Serialize};

use crate::address::Address;

// ---------------------------------------------------------------------------
// Fixed-point scales
// ---------------------------------------------------------------------------

/// Internal pricing precision. All cross-asset values are normalized to
/// 18 decimals before any multiplication or division, whatever the native
/// precision of the assets involved. 18 because that is what the rest of
/// the on-chain world settled on, and fighting it buys nothing.
pub const INTERNAL_DECIMALS: u8 = 18;

/// One whole unit at [`INTERNAL_DECIMALS`] precision. 10^18.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Basis-point scale: 10_000 = 1.0 = 100%. Rates, fees, and the
/// rate-update bounds are all expressed against this denominator.
pub const BPS_SCALE: u128 = 10_000;

/// Seconds in the accrual year: 365 days flat. No leap-year cleverness —
/// annualized rates divide by this and nothing else.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Governance limits
// ---------------------------------------------------------------------------

/// Hard cap on the management fee: 2_000 bps = 20%. A vault asking for
/// more than a fifth of assets per year is not a vault, it's an exit scam.
pub const MAX_MANAGEMENT_FEE_BPS: u16 = 2_000;

/// Hard cap on `minimum_update_delay`: 14 days in seconds. Any longer and
/// the oracle could be locked out of pushing rates for weeks at a time.
pub const MAX_UPDATE_DELAY_SECS: u64 = 14 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// Construction parameters for the [`Accountant`](crate::accountant::Accountant).
///
/// One instance per vault, consumed at construction. Rates are annualized
/// basis points, bounds are bps of 1.0 (10_000 = no change allowed past
/// the accrued rate), times are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountantConfig {
    /// The base asset every rate and fee figure is denominated in.
    pub base_asset: Address,
    /// The vault's own share token. Also the only address allowed to
    /// invoke fee claims.
    pub share_asset: Address,
    /// Destination for claimed fees.
    pub payout_address: Address,
    /// Starting NAV, base-asset units per share, at base-asset decimals.
    pub starting_exchange_rate: u128,
    /// Upper bound on an explicit rate push, bps of the accrued rate.
    /// Must be >= 10_000.
    pub allowed_change_upper_bps: u16,
    /// Lower bound on an explicit rate push, bps of the accrued rate.
    /// Must be <= 10_000.
    pub allowed_change_lower_bps: u16,
    /// Minimum wall-clock seconds between explicit rate pushes.
    pub minimum_update_delay_secs: u64,
    /// Annualized management fee in bps, charged on explicit rate pushes.
    pub management_fee_bps: u16,
    /// Ceiling for `lending_rate_bps`, adjustable later but never below
    /// the active lending rate.
    pub max_lending_rate_bps: u16,
    /// Initial annualized lending rate in bps. Drives NAV accrual.
    pub lending_rate_bps: u16,
    /// Initial annualized protocol fee rate in bps. Drives fee accrual.
    pub protocol_fee_rate_bps: u16,
    /// Unix-seconds timestamp the accrual and update clocks start from.
    pub genesis_time: u64,
}
