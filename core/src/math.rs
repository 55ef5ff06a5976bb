//! # Fixed-Point & Decimal-Rescaling Math
//!
//! Floor-rounding integer math over `u128` amounts, widened through
//! [`U256`] so that intermediate products never overflow. Everything the
//! accounting engine and the settlement queue multiply or divide goes
//! through this module — there is exactly one rounding policy in Basin
//! (down) and it lives here.

use alloy_primitives::U256;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from fixed-point arithmetic.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    /// Division by zero. The denominator came from a price feed or a
    /// decimals lookup, and one of them handed us a zero.
    #[error("division by zero in fixed-point math")]
    DivisionByZero,

    /// The final result does not fit back into a `u128`.
    ///
    /// Intermediates are 256-bit and cannot overflow for any pair of
    /// `u128` factors; this fires only when the *quotient* itself is
    /// too large, which means the inputs were economically absurd.
    #[error("fixed-point result overflows u128")]
    Overflow,

    /// A decimal rescale was asked to move past 38 decimal places of
    /// difference, which no real asset pair ever needs.
    #[error("unsupported decimal rescale: {from} -> {to}")]
    DecimalsOutOfRange {
        /// Source precision.
        from: u8,
        /// Target precision.
        to: u8,
    },
}

// ---------------------------------------------------------------------------
// Core operations
// ---------------------------------------------------------------------------

/// Computes `⌊a * b / denominator⌋` with a 256-bit intermediate.
///
/// # Errors
///
/// [`MathError::DivisionByZero`] if `denominator == 0`;
/// [`MathError::Overflow`] if the quotient exceeds `u128::MAX`.
pub fn mul_div_down(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let wide = U256::from(a) * U256::from(b) / U256::from(denominator);
    u128::try_from(wide).map_err(|_| MathError::Overflow)
}

/// Returns `10^exp` as a `u128`.
///
/// # Errors
///
/// [`MathError::DecimalsOutOfRange`] for `exp > 38` (10^39 does not fit).
pub fn pow10(exp: u8) -> Result<u128, MathError> {
    10u128
        .checked_pow(exp as u32)
        .ok_or(MathError::DecimalsOutOfRange { from: exp, to: exp })
}

/// Rescales `amount` from `from` decimals to `to` decimals.
///
/// Multiplies by `10^(to - from)` when precision increases, floor-divides
/// by `10^(from - to)` when it decreases. Used uniformly by the engine and
/// the queue; the down-scaling direction drops sub-unit dust.
pub fn scale_decimals(amount: u128, from: u8, to: u8) -> Result<u128, MathError> {
    match from.cmp(&to) {
        std::cmp::Ordering::Equal => Ok(amount),
        std::cmp::Ordering::Less => {
            let factor = pow10(to - from).map_err(|_| MathError::DecimalsOutOfRange { from, to })?;
            amount.checked_mul(factor).ok_or(MathError::Overflow)
        }
        std::cmp::Ordering::Greater => {
            let factor = pow10(from - to).map_err(|_| MathError::DecimalsOutOfRange { from, to })?;
            Ok(amount / factor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WAD;

    #[test]
    fn mul_div_down_floors() {
        // 7 * 3 / 2 = 10.5 -> 10
        assert_eq!(mul_div_down(7, 3, 2).unwrap(), 10);
    }

    #[test]
    fn mul_div_down_identity() {
        // a * b / b == a for any nonzero b
        assert_eq!(mul_div_down(123_456, 789, 789).unwrap(), 123_456);
        assert_eq!(mul_div_down(u128::MAX, 7, 7).unwrap(), u128::MAX);
    }

    #[test]
    fn mul_div_down_wide_intermediate() {
        // Both factors near u128::MAX: the product is ~2^254 and must not
        // overflow because the denominator brings it back down.
        let a = u128::MAX;
        let b = u128::MAX;
        assert_eq!(mul_div_down(a, b, u128::MAX).unwrap(), u128::MAX);
    }

    #[test]
    fn mul_div_down_rejects_zero_denominator() {
        assert_eq!(mul_div_down(1, 1, 0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn mul_div_down_rejects_overflowing_quotient() {
        assert_eq!(mul_div_down(u128::MAX, 2, 1), Err(MathError::Overflow));
    }

    #[test]
    fn scale_up_is_exact() {
        assert_eq!(scale_decimals(5, 6, 18).unwrap(), 5_000_000_000_000);
        assert_eq!(scale_decimals(0, 0, 18).unwrap(), 0);
    }

    #[test]
    fn scale_down_floors_dust() {
        // 1.5 units at 18 decimals, viewed at 6 decimals, keeps the .5;
        // anything below 10^12 is dust and is dropped.
        assert_eq!(scale_decimals(WAD + WAD / 2, 18, 6).unwrap(), 1_500_000);
        assert_eq!(scale_decimals(999_999_999_999, 18, 6).unwrap(), 0);
    }

    #[test]
    fn scale_same_precision_is_identity() {
        assert_eq!(scale_decimals(42, 9, 9).unwrap(), 42);
    }

    #[test]
    fn scale_up_then_down_roundtrips() {
        // Up-scaling is lossless, so up-then-down must reproduce exactly.
        for amount in [0u128, 1, 999, 1_000_000_000_000_000_000] {
            let up = scale_decimals(amount, 6, 18).unwrap();
            assert_eq!(scale_decimals(up, 18, 6).unwrap(), amount);
        }
    }

    #[test]
    fn scale_up_overflow_is_reported() {
        assert_eq!(
            scale_decimals(u128::MAX, 0, 18),
            Err(MathError::Overflow)
        );
    }

    #[test]
    fn pow10_limits() {
        assert_eq!(pow10(0).unwrap(), 1);
        assert_eq!(pow10(18).unwrap(), WAD);
        assert!(pow10(39).is_err());
    }
}
