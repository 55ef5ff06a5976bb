//! # Pending Requests & Advisory Previews
//!
//! The request record a user parks in the queue, the key it is filed
//! under, and the read-only validity/preview types. Everything here is
//! advisory except the record itself: balances, allowances, and deadlines
//! can all change between a preview and the settlement that follows it.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Key of one pending request: a user may hold at most one request per
/// (offer asset, want asset) pair, and overwrites it freely while it is
/// not locked by an in-flight settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    /// The request's owner, the only party allowed to overwrite it.
    pub user: Address,
    /// Asset the user is giving up.
    pub offer_asset: Address,
    /// Asset the user wants in return.
    pub want_asset: Address,
}

/// One pending conversion request.
///
/// `in_solve` is a transient lock: true only while a settlement holds the
/// request mid-flight. Every settlement attempt, successful or not, must
/// leave it false — a lingering lock is an invariant breach, not a state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicRequest {
    /// Unix-seconds deadline; the request is settleable through this
    /// instant and expired strictly after it.
    pub deadline: u64,
    /// Amount of the offer asset. Zero means cancelled / nothing pending.
    pub offer_amount: u128,
    /// Settlement lock.
    pub in_solve: bool,
}

impl AtomicRequest {
    /// A fresh unlocked request.
    pub fn new(deadline: u64, offer_amount: u128) -> Self {
        Self {
            deadline,
            offer_amount,
            in_solve: false,
        }
    }
}

/// Why a request would not settle right now. All-false means clean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFlaws {
    /// Locked by an in-flight settlement.
    pub locked: bool,
    /// Deadline has passed.
    pub expired: bool,
    /// Nothing offered.
    pub zero_offer: bool,
    /// Prices to a zero want amount at the current NAV.
    pub zero_want: bool,
    /// The user does not hold the offered amount.
    pub insufficient_balance: bool,
    /// The user has not authorized the queue for the offered amount.
    pub insufficient_allowance: bool,
}

impl RequestFlaws {
    /// True when nothing stands in the way of settling this request.
    pub fn is_clean(&self) -> bool {
        *self == RequestFlaws::default()
    }
}

/// Per-user row of a batch preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveMetadata {
    /// The request's owner.
    pub user: Address,
    /// Everything wrong with the request, if anything.
    pub flaws: RequestFlaws,
    /// The pending offer amount.
    pub offer_amount: u128,
    /// The want amount this request would price to right now.
    pub want_amount: u128,
}

/// Advisory preview of a whole batch: per-user rows plus aggregate totals
/// over the flaw-free members only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvePreview {
    /// One row per requested user, in the order asked.
    pub members: Vec<SolveMetadata>,
    /// Sum of offer amounts over clean members.
    pub total_offered: u128,
    /// Sum of want amounts over clean members.
    pub total_wanted: u128,
}
